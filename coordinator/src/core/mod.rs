//! Coordinator core logic

pub mod dispatcher;
pub mod keywords;
pub mod maintenance;

pub use dispatcher::{Dispatcher, UnitOutcome, DEFAULT_STAGGER};
pub use keywords::KeywordCatalog;
pub use maintenance::MaintenanceEngine;
