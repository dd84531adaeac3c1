//! Shared error types for the article generation system

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },

    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: String, value: String },

    #[error("Invalid UUID: {input}")]
    InvalidUuid { input: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SharedError {
    pub fn invalid_config(field: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            value: value.to_string(),
        }
    }

    pub fn unknown_variant(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

pub type SharedResult<T> = Result<T, SharedError>;
