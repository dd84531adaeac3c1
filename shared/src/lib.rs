//! Shared types for the article generation system
//!
//! Contains the types exchanged between the generation client, the coordinator
//! and the HTTP API, plus settings and logging helpers used by every binary.

pub mod config;
pub mod errors;
pub mod logging;
pub mod types;

pub use config::Settings;
pub use errors::*;
pub use types::*;
