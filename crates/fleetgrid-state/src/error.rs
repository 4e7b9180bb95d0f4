//! Error types for the FleetGrid state stores.

use fleet_core::{PluginError, ResourceKind};
use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("{kind} {key} not found")]
    NotFound { kind: ResourceKind, key: String },

    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: ResourceKind, key: String },
}

impl From<StateError> for PluginError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::NotFound { kind, key } => PluginError::NotFound { kind, key },
            StateError::AlreadyExists { kind, key } => PluginError::AlreadyExists { kind, key },
            other => PluginError::Backend(other.to_string()),
        }
    }
}
