pub mod audio;
pub mod backend;
pub mod capture;
pub mod client;
pub mod config;
pub mod error;
pub mod inventory;
pub mod playback;
pub mod realtime_api;
pub mod session;
pub mod tools;

#[cfg(test)]
mod testing;

pub use office_voice_types as types;
pub use office_voice_utils as utils;
pub use client::{Client, GeminiConnector};
pub use error::SessionError;
pub use session::{SessionController, SessionState};
