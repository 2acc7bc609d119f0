//! Error types for configuration loading.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading or resolving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Environment '{environment}' not found in {} (available: {})", path.display(), available.join(", "))]
    EnvironmentNotFound {
        environment: String,
        path: PathBuf,
        available: Vec<String>,
    },

    #[error("Malformed config {}: {reason}", path.display())]
    MalformedConfig { path: PathBuf, reason: String },
}

impl ConfigError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedConfig {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
