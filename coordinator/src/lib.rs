//! Coordinator library for batch article generation
//!
//! Drives bounded-concurrency generation runs against a rate-limited
//! generator, tracks run progress, and maintains the persisted article
//! collection (deduplication, purge, normalization and renumbering).

pub mod coordinator;
pub mod core;
pub mod error;
pub mod services;
pub mod state;
pub mod traits;

// Re-export commonly used types
pub use crate::coordinator::Coordinator;
pub use crate::core::{Dispatcher, KeywordCatalog, MaintenanceEngine};
pub use error::{CoordinatorError, CoordinatorResult};
pub use services::SqliteStore;
pub use state::{Run, RunStateTracker};
pub use traits::{ArticleStore, MockArticleStore};
