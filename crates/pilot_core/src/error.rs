//! Error types for orchestration.

use std::path::PathBuf;

use pilot_config::ConfigError;
use pilot_runner::RemoteError;
use thiserror::Error;

/// Result type alias for orchestration operations.
pub type PilotResult<T> = Result<T, PilotError>;

/// Broad class of a failure, used to pick the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or malformed document, unknown environment, missing local input
    Configuration,
    /// Missing tool or credentials
    Dependency,
    /// Packaging, deployment, sync or invalidation failure
    RemoteOperation,
}

/// Errors that can occur while running an action.
#[derive(Error, Debug)]
pub enum PilotError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Action '{0}' requires an environment")]
    EnvironmentRequired(String),

    #[error("Template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("Content directory not found: {}", .0.display())]
    ContentDirNotFound(PathBuf),

    #[error("Missing dependency: {0} is not installed or not on PATH")]
    MissingDependency(String),

    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Packaging failed: {0}")]
    PackagingFailed(String),

    #[error("Deployment of stack {stack} failed: {reason}")]
    DeployFailed { stack: String, reason: String },

    #[error("Stack not found: {0}")]
    StackNotFound(String),

    #[error("Stack {stack} has no value for required output {key}")]
    MissingOutput { stack: String, key: String },

    #[error("Failed to {step}: {cause}")]
    Remote { step: String, cause: RemoteError },
}

impl PilotError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PilotError::Config(_)
            | PilotError::EnvironmentRequired(_)
            | PilotError::TemplateNotFound(_)
            | PilotError::ContentDirNotFound(_) => ErrorCategory::Configuration,
            PilotError::MissingDependency(_) | PilotError::NotAuthenticated(_) => {
                ErrorCategory::Dependency
            }
            PilotError::Remote {
                cause: RemoteError::CliNotAvailable(_),
                ..
            } => ErrorCategory::Dependency,
            PilotError::PackagingFailed(_)
            | PilotError::DeployFailed { .. }
            | PilotError::StackNotFound(_)
            | PilotError::MissingOutput { .. }
            | PilotError::Remote { .. } => ErrorCategory::RemoteOperation,
        }
    }
}

/// Wrap a control-plane failure with the step it interrupted.
pub(crate) fn remote(step: impl Into<String>) -> impl FnOnce(RemoteError) -> PilotError {
    let step = step.into();
    move |cause| PilotError::Remote { step, cause }
}
