//! Producer error types

use thiserror::Error;

/// Result type for producer operations
pub type ProducerResult<T> = Result<T, ProducerError>;

/// Producer error types
///
/// Per-request failures are reported as `shared::GenerationFailure` values;
/// these errors cover setting up the client itself.
#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}
