//! Webserver library for the article generation coordinator
//!
//! Exposes run control, article browsing, maintenance and settings as a
//! JSON API over axum.

pub mod error;
pub mod state;
pub mod web;
pub mod webserver_impl;

// Re-export main types
pub use error::{WebServerError, WebServerResult};
pub use state::{AppState, StatusLog};
pub use webserver_impl::{build_router, WebServer};
