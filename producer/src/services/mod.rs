//! Producer services implementations

pub mod chat_client;

#[cfg(test)]
pub mod tests;

pub use chat_client::*;
