//! Coordinator services implementations

pub mod sqlite_store;

#[cfg(test)]
pub mod tests;

pub use sqlite_store::SqliteStore;
