//! Executes model-issued function calls against the office backend.
//!
//! Every call yields exactly one [`FunctionResponse`]: either
//! `{"output": ...}` or `{"error": ...}`. A failing call never affects its
//! siblings or the session.

pub mod schema;

use crate::error::SessionError;
use crate::inventory::{derive_key, find_electronics, InventoryStore};
use office_voice_types::inventory::{
    ElectronicsDraft, ElectronicsState, ElectronicsType, MappingDraft, RoomDraft, StateChange,
};
use office_voice_types::{FunctionCall, FunctionResponse};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeTool {
    ControlDevice,
    CreateRoom,
    CreateElectronics,
    MapElectronicsToRoom,
}

impl OfficeTool {
    pub fn name(&self) -> &'static str {
        match self {
            OfficeTool::ControlDevice => schema::CONTROL_DEVICE,
            OfficeTool::CreateRoom => schema::CREATE_ROOM,
            OfficeTool::CreateElectronics => schema::CREATE_ELECTRONICS,
            OfficeTool::MapElectronicsToRoom => schema::MAP_ELECTRONICS_TO_ROOM,
        }
    }
}

impl FromStr for OfficeTool {
    type Err = SessionError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            schema::CONTROL_DEVICE => Ok(OfficeTool::ControlDevice),
            schema::CREATE_ROOM => Ok(OfficeTool::CreateRoom),
            schema::CREATE_ELECTRONICS => Ok(OfficeTool::CreateElectronics),
            schema::MAP_ELECTRONICS_TO_ROOM => Ok(OfficeTool::MapElectronicsToRoom),
            other => Err(SessionError::ToolArgument(format!("Unknown function: {other}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ControlDeviceArgs {
    device_ids: Vec<String>,
    state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomArgs {
    room_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateElectronicsArgs {
    electronics_name: String,
    #[serde(rename = "type")]
    electronics_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapElectronicsToRoomArgs {
    room_name: String,
    electronics_name: String,
}

fn parse_args<T: DeserializeOwned>(tool: OfficeTool, call: &FunctionCall) -> Result<T, SessionError> {
    serde_json::from_value(call.args.clone()).map_err(|e| {
        SessionError::ToolArgument(format!("Invalid arguments for {}: {}", tool.name(), e))
    })
}

pub struct ToolDispatcher {
    inventory: Arc<InventoryStore>,
}

impl ToolDispatcher {
    pub fn new(inventory: Arc<InventoryStore>) -> Self {
        Self { inventory }
    }

    /// Runs one call to completion and produces its response.
    pub async fn dispatch(&self, call: &FunctionCall) -> FunctionResponse {
        tracing::info!("[ToolCall] {} args: {}", call.name, call.args);
        match self.execute(call).await {
            Ok(message) => FunctionResponse::output(call, message),
            Err(e) => {
                tracing::error!("[ToolCall] Error in {}: {}", call.name, e);
                FunctionResponse::error(call, e.to_string())
            }
        }
    }

    async fn execute(&self, call: &FunctionCall) -> Result<String, SessionError> {
        let tool: OfficeTool = call.name.parse()?;
        let message = match tool {
            OfficeTool::ControlDevice => self.control_device(parse_args(tool, call)?).await?,
            OfficeTool::CreateRoom => self.create_room(parse_args(tool, call)?).await?,
            OfficeTool::CreateElectronics => {
                self.create_electronics(parse_args(tool, call)?).await?
            }
            OfficeTool::MapElectronicsToRoom => {
                self.map_electronics_to_room(parse_args(tool, call)?).await?
            }
        };
        self.refresh_inventory().await;
        Ok(message)
    }

    async fn control_device(&self, args: ControlDeviceArgs) -> Result<String, SessionError> {
        if args.device_ids.is_empty() {
            return Err(SessionError::ToolArgument(
                "Invalid arguments for controlDevice: deviceIds must not be empty".to_string(),
            ));
        }
        let state = ElectronicsState::from_str(&args.state).map_err(|e| {
            SessionError::ToolArgument(format!("Invalid arguments for controlDevice: {e}"))
        })?;
        let change = StateChange {
            electronics_ids: args.device_ids,
            state,
        };
        self.inventory.backend().set_state(&change).await?;
        Ok("OK, device state updated.".to_string())
    }

    async fn create_room(&self, args: CreateRoomArgs) -> Result<String, SessionError> {
        let room_key = derive_key(&args.room_name);
        if room_key.is_empty() {
            return Err(SessionError::ToolArgument(format!(
                "Invalid arguments for createRoom: {:?} has no letters or digits",
                args.room_name
            )));
        }
        let draft = RoomDraft {
            room_name: args.room_name,
            room_key,
        };
        self.inventory.backend().create_room(&draft).await?;
        Ok(format!("Room \"{}\" created successfully.", draft.room_name))
    }

    async fn create_electronics(&self, args: CreateElectronicsArgs) -> Result<String, SessionError> {
        let electronics_type = ElectronicsType::from_str(&args.electronics_type).map_err(|e| {
            SessionError::ToolArgument(format!("Invalid arguments for createElectronics: {e}"))
        })?;
        let electronics_key = derive_key(&args.electronics_name);
        if electronics_key.is_empty() {
            return Err(SessionError::ToolArgument(format!(
                "Invalid arguments for createElectronics: {:?} has no letters or digits",
                args.electronics_name
            )));
        }
        let draft = ElectronicsDraft {
            electronics_name: args.electronics_name,
            electronics_key,
            electronics_type,
        };
        self.inventory.backend().create_electronics(&draft).await?;
        Ok(format!(
            "Electronic \"{}\" ({}) created successfully.",
            draft.electronics_name, draft.electronics_type
        ))
    }

    async fn map_electronics_to_room(
        &self,
        args: MapElectronicsToRoomArgs,
    ) -> Result<String, SessionError> {
        let room = self
            .inventory
            .find_room(&args.room_name)
            .ok_or_else(|| SessionError::Lookup(format!("Room \"{}\" not found.", args.room_name)))?;

        // The device may have been created after the last layout refresh.
        let all_electronics = self.inventory.backend().list_electronics().await?;
        let electronic = find_electronics(&all_electronics, &args.electronics_name).ok_or_else(|| {
            SessionError::Lookup(format!("Electronic \"{}\" not found.", args.electronics_name))
        })?;

        let draft = MappingDraft {
            room_id: room.room_id,
            electronics_id: electronic.electronics_id.clone(),
        };
        self.inventory.backend().create_mapping(&draft).await?;
        Ok(format!(
            "\"{}\" mapped to \"{}\" successfully.",
            args.electronics_name, args.room_name
        ))
    }

    async fn refresh_inventory(&self) {
        if let Err(e) = self.inventory.refresh().await {
            tracing::warn!("[ToolCall] layout refresh after mutation failed: {}", e);
        }
    }
}
