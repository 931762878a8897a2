//! Application Configuration Module
//!
//! Loads settings from the environment (and a `.env` file when present)
//! into a single struct that is passed to the session and backend client.

use crate::client::DEFAULT_MODEL;
use std::env;
use tracing::Level;

/// Number of mono samples per captured microphone frame.
pub const CAPTURE_FRAME_SIZE: usize = 4096;
/// Capacity of the channels between the transport, the capture callback and the session.
pub const CHANNEL_CAPACITY: usize = 1024;

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub backend_url: String,
    pub model: String,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `GEMINI_API_KEY`: Credential for the realtime service. Optional here; a session refuses to start without it.
    // *   `BACKEND_URL`: Base URL of the office backend, e.g. "http://localhost:8080". Required.
    // *   `REALTIME_MODEL`: (Optional) Realtime model identifier.
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("GEMINI_API_KEY").filter(|key| !key.trim().is_empty());

        let backend_url = lookup("BACKEND_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("BACKEND_URL".to_string()))?;

        let model = lookup("REALTIME_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            api_key,
            backend_url: backend_url.trim_end_matches('/').to_string(),
            model,
            log_level,
        })
    }
}
