//! Error types for the command sync queue.
//!

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandSyncError {
    /// A required argument was absent (construction-time validation)
    #[error("Argument required: {0}")]
    ArgumentRequired(String),
    /// The operation does not fit the command or queue lifecycle
    #[error("Invalid state: {0}")]
    InvalidState(String),
    /// A mutating orchestrator operation ran before `initialize`
    #[error("Command sync orchestrator {orchestrator_id} is not initialized")]
    Uninitialized { orchestrator_id: String },
    #[error("Persistence error during {operation} for key {key}: {reason}")]
    Persistence {
        operation: String,
        key: String,
        reason: String,
    },
    #[error("Consolidation error: {0}")]
    Consolidation(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CommandSyncError {
    pub fn argument_required(name: impl Into<String>) -> Self {
        Self::ArgumentRequired(name.into())
    }

    pub fn persistence(
        operation: impl Into<String>,
        key: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::Persistence {
            operation: operation.into(),
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for CommandSyncError {
    fn from(error: serde_json::Error) -> Self {
        CommandSyncError::Serialization(format!("JSON serialization error: {error}"))
    }
}

impl From<config::ConfigError> for CommandSyncError {
    fn from(error: config::ConfigError) -> Self {
        CommandSyncError::Configuration(error.to_string())
    }
}

pub type CommandSyncResult<T> = std::result::Result<T, CommandSyncError>;
