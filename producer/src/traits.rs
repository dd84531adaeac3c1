//! Producer trait definitions for dependency injection

use async_trait::async_trait;

use shared::GenerationResult;

/// Article generation collaborator
///
/// Implementations own their rate limiter and acquire it before every
/// outbound request. Failures are returned as values, never panics.
#[mockall::automock]
#[async_trait]
pub trait ArticleGenerator: Send + Sync {
    /// Generate one article for the composite seed
    async fn generate(&self, seed: &str, index: u64, length_hint: &str) -> GenerationResult;

    /// Requests still available in the current rate window
    fn remaining_capacity(&self) -> u32;

    /// Replace the credential used for subsequent requests
    fn update_api_key(&self, api_key: &str);
}
