//! Local mirror of the backend's room/electronics layout.

use crate::backend::{Backend, BackendError};
use office_voice_types::inventory::{Electronics, OfficeLayout, Room};
use std::sync::{Arc, RwLock};

const INSTRUCTION_PREAMBLE: &str = "You are an office assistant. Your role is to control devices like lights and ACs based on user commands. CRITICAL: You MUST always respond, transcribe, and communicate ONLY in English. Always transcribe the user's speech into English regardless of what language they speak. Never use any other language or script under any circumstances. Use the provided device list to find the correct device IDs for the user's request. You can control multiple devices at once. When a command is ambiguous (e.g., \"turn off the light\" when there are multiple), ask clarifying questions. Be concise.";

/// Builds the model-facing system instruction from the current layout.
pub fn system_instruction(layout: &[Room]) -> String {
    let device_list = layout
        .iter()
        .map(|room| {
            let devices = room
                .electronics
                .iter()
                .map(|d| {
                    format!(
                        "- {} (type: {}, id: {})",
                        d.electronics_name, d.electronics_type, d.electronics_id
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            format!("In the \"{}\":\n{}", room.room_name, devices)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{INSTRUCTION_PREAMBLE}\n\nHere is the list of available devices and their IDs:\n{device_list}")
}

/// Derives a URL-safe key from a display name.
///
/// `"Conference Room #1!"` becomes `"conference-room-1"`.
pub fn derive_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut pending_separator = false;
    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !key.is_empty() {
                key.push('-');
            }
            pending_separator = false;
            key.push(c);
        } else {
            pending_separator = true;
        }
    }
    key
}

/// Case-insensitive name lookup over a list of electronics.
pub fn find_electronics<'a>(electronics: &'a [Electronics], name: &str) -> Option<&'a Electronics> {
    let wanted = name.to_lowercase();
    electronics
        .iter()
        .find(|e| e.electronics_name.to_lowercase() == wanted)
}

#[derive(Debug, Clone)]
struct Snapshot {
    layout: OfficeLayout,
    instruction: String,
}

/// The cached layout plus the system instruction derived from it.
///
/// Empty until the first successful [`InventoryStore::refresh`]; a failed
/// refresh keeps the previous snapshot.
pub struct InventoryStore {
    backend: Arc<dyn Backend>,
    snapshot: RwLock<Option<Snapshot>>,
}

impl InventoryStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            snapshot: RwLock::new(None),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_layout(backend: Arc<dyn Backend>, layout: OfficeLayout) -> Self {
        let instruction = system_instruction(&layout);
        Self {
            backend,
            snapshot: RwLock::new(Some(Snapshot {
                layout,
                instruction,
            })),
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub async fn refresh(&self) -> Result<(), BackendError> {
        let layout = self.backend.layout().await.inspect_err(|e| {
            tracing::error!("Error fetching office layout: {}", e);
        })?;
        let instruction = system_instruction(&layout);
        tracing::debug!(
            "Office layout refreshed: {} rooms, {} devices",
            layout.len(),
            layout.iter().map(|r| r.electronics.len()).sum::<usize>()
        );
        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Snapshot {
            layout,
            instruction,
        });
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.read(|s| s.is_some())
    }

    pub fn layout(&self) -> OfficeLayout {
        self.read(|s| s.as_ref().map(|s| s.layout.clone()).unwrap_or_default())
    }

    pub fn system_instruction(&self) -> Option<String> {
        self.read(|s| s.as_ref().map(|s| s.instruction.clone()))
    }

    /// Case-insensitive room lookup against the cached layout.
    pub fn find_room(&self, name: &str) -> Option<Room> {
        let wanted = name.to_lowercase();
        self.read(|s| {
            s.as_ref()?
                .layout
                .iter()
                .find(|room| room.room_name.to_lowercase() == wanted)
                .cloned()
        })
    }

    fn read<T>(&self, f: impl FnOnce(&Option<Snapshot>) -> T) -> T {
        let guard = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }
}
