//! Coordinator-specific error types

use thiserror::Error;
use shared::SharedError;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("A generation run is already in progress")]
    RunInProgress,

    #[error("Maintenance integrity failure during {operation}: {reason}")]
    IntegrityFailure { operation: String, reason: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Invalid stored timestamp: {value}")]
    Timestamp { value: String },

    #[error("Lock poisoned: {resource}")]
    LockPoisoned { resource: String },

    #[error("Configuration error: {field}")]
    ConfigurationError { field: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

impl CoordinatorError {
    pub fn integrity(operation: &str, reason: impl ToString) -> Self {
        Self::IntegrityFailure {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
