//! Error types for control-plane operations.

use thiserror::Error;

/// Result type alias for control-plane operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors that can occur while talking to the control plane.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("aws CLI not available: {0}")]
    CliNotAvailable(String),

    #[error("Credentials did not resolve to an account: {0}")]
    NotAuthenticated(String),

    #[error("`{command}` failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Unexpected response from `{command}`: {message}")]
    UnexpectedResponse { command: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RemoteError {
    pub fn command_failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }
}
