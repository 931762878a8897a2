use crate::backend::BackendError;

/// Failures of the realtime session and the tools it drives.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("a session is already running")]
    AlreadyActive,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("audio device error: {0}")]
    Audio(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("{0}")]
    ToolArgument(String),

    #[error("{0}")]
    Lookup(String),
}

impl SessionError {
    pub fn transport(message: impl std::fmt::Display) -> Self {
        Self::Transport(message.to_string())
    }

    pub fn audio(message: impl std::fmt::Display) -> Self {
        Self::Audio(message.to_string())
    }

    /// The human-readable status shown when this error ends or prevents a session.
    pub fn status_text(&self) -> String {
        match self {
            SessionError::PermissionDenied(_) => {
                "Error: Microphone permission denied. Please allow microphone access.".to_string()
            }
            SessionError::ConfigurationMissing(what) => format!("Error: {what}"),
            SessionError::AlreadyActive => "Error: A session is already running.".to_string(),
            SessionError::Transport(message) if is_auth_rejection(message) => {
                "Error: Invalid API key. Please check your .env file.".to_string()
            }
            SessionError::Transport(message) if message.is_empty() => {
                "Error: Connection error. Please try again.".to_string()
            }
            other => format!("Error: {}", other.detail()),
        }
    }

    fn detail(&self) -> String {
        match self {
            SessionError::Transport(message) | SessionError::Audio(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

fn is_auth_rejection(message: &str) -> bool {
    message.contains("API key") || message.contains("401") || message.contains("403")
}
