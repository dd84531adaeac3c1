//! Producer library for article generation
//!
//! Wraps the external chat-completion service behind the `ArticleGenerator`
//! trait: rate limiting, prompt construction, the HTTP call and parsing of
//! the Markdown response.

pub mod core;
pub mod error;
pub mod services;
pub mod traits;

// Re-export main types
pub use crate::core::RateLimiter;
pub use error::{ProducerError, ProducerResult};
pub use services::*;
pub use traits::*;
