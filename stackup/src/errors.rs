//! Error types for the deployment engine

use std::time::Duration;

use thiserror::Error;

/// Main error type for the deployment engine
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Remote API error: {0}")]
    RemoteError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Changeset {change_set} failed to reach state {awaited:?} within {waited:?}")]
    Timeout {
        change_set: String,
        awaited: Vec<String>,
        waited: Duration,
    },

    #[error("Changeset failed: {0}")]
    ChangeSetFailed(String),

    #[error("Stack failed: {0}")]
    StackFailed(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for DeployError {
    fn from(err: anyhow::Error) -> Self {
        DeployError::Internal(err.to_string())
    }
}
