//! Room and electronics records mirrored from the office backend.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ElectronicsType {
    Light,
    Ac,
    Tv,
    Speaker,
    Fan,
    Projector,
    Printer,
    Camera,
    Router,
    Curtain,
}

impl ElectronicsType {
    pub const ALL: [ElectronicsType; 10] = [
        ElectronicsType::Light,
        ElectronicsType::Ac,
        ElectronicsType::Tv,
        ElectronicsType::Speaker,
        ElectronicsType::Fan,
        ElectronicsType::Projector,
        ElectronicsType::Printer,
        ElectronicsType::Camera,
        ElectronicsType::Router,
        ElectronicsType::Curtain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElectronicsType::Light => "LIGHT",
            ElectronicsType::Ac => "AC",
            ElectronicsType::Tv => "TV",
            ElectronicsType::Speaker => "SPEAKER",
            ElectronicsType::Fan => "FAN",
            ElectronicsType::Projector => "PROJECTOR",
            ElectronicsType::Printer => "PRINTER",
            ElectronicsType::Camera => "CAMERA",
            ElectronicsType::Router => "ROUTER",
            ElectronicsType::Curtain => "CURTAIN",
        }
    }
}

impl fmt::Display for ElectronicsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElectronicsType {
    type Err = String;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| format!("unknown electronics type: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ElectronicsState {
    On,
    Off,
}

impl ElectronicsState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElectronicsState::On => "ON",
            ElectronicsState::Off => "OFF",
        }
    }
}

impl fmt::Display for ElectronicsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElectronicsState {
    type Err = String;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ON" => Ok(ElectronicsState::On),
            "OFF" => Ok(ElectronicsState::Off),
            _ => Err(format!("state must be ON or OFF, got {s:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Electronics {
    #[serde(rename = "_id", default)]
    pub object_id: String,
    pub electronics_id: String,
    pub electronics_name: String,
    #[serde(default)]
    pub electronics_key: String,
    /// Kept as sent; the backend may know types this client does not.
    #[serde(rename = "type")]
    pub electronics_type: String,
    #[serde(default = "default_state")]
    pub state: String,
}

fn default_state() -> String {
    ElectronicsState::Off.to_string()
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Room {
    #[serde(rename = "_id", default)]
    pub object_id: String,
    pub room_id: String,
    pub room_name: String,
    #[serde(default)]
    pub room_key: String,
    #[serde(default)]
    pub electronics: Vec<Electronics>,
}

/// `GET /layout`: rooms in backend order, each with its electronics.
pub type OfficeLayout = Vec<Room>;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RoomElectronicsMap {
    #[serde(rename = "_id", default)]
    pub object_id: String,
    pub room_electronics_map_id: String,
    pub room_id: String,
    pub electronics_id: String,
}

/// `PATCH /electronics/state` body.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChange {
    pub electronics_ids: Vec<String>,
    pub state: ElectronicsState,
}

/// `POST /rooms` and `PUT /rooms/:id` body.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RoomDraft {
    pub room_name: String,
    pub room_key: String,
}

/// `POST /electronics` and `PUT /electronics/:id` body.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ElectronicsDraft {
    pub electronics_name: String,
    pub electronics_key: String,
    #[serde(rename = "type")]
    pub electronics_type: ElectronicsType,
}

/// `POST /room-electronics-map` body.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MappingDraft {
    pub room_id: String,
    pub electronics_id: String,
}
