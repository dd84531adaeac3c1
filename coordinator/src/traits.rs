//! Trait definitions with mockall annotations for testing
//!
//! The article store is injected into the dispatcher, the maintenance engine
//! and the coordinator facade so each can be tested against a mock.

use async_trait::async_trait;

use shared::{ArticlePage, ArticleQuery, ArticleRecord, FieldUpdate, NewArticle};
use crate::error::CoordinatorResult;

/// Persistent article collection
///
/// Bulk operations (`delete_batch`, `update_fields_batch`,
/// `rebuild_in_order`) are each applied in a single transaction: either every
/// change lands or none does.
#[mockall::automock]
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert a record, normalizing title and tags; returns the new id
    async fn insert_article(&self, article: NewArticle) -> CoordinatorResult<i64>;

    /// Exact-match title lookup
    async fn title_exists(&self, title: &str) -> CoordinatorResult<bool>;

    async fn get_by_id(&self, id: i64) -> CoordinatorResult<Option<ArticleRecord>>;

    /// Returns false when no record had the id
    async fn delete_by_id(&self, id: i64) -> CoordinatorResult<bool>;

    /// Remove every record and reset the id counter
    async fn delete_all(&self) -> CoordinatorResult<u64>;

    /// Flip the read flag; returns false when no record had the id
    async fn toggle_read(&self, id: i64) -> CoordinatorResult<bool>;

    async fn count(&self) -> CoordinatorResult<u64>;

    /// Every record, ordered by id
    async fn scan_all(&self) -> CoordinatorResult<Vec<ArticleRecord>>;

    async fn paginated_query(&self, query: ArticleQuery) -> CoordinatorResult<ArticlePage>;

    /// Delete the given ids in one transaction; returns rows removed
    async fn delete_batch(&self, ids: Vec<i64>) -> CoordinatorResult<u64>;

    /// Apply title/tag replacements in one transaction; returns rows changed
    async fn update_fields_batch(&self, updates: Vec<FieldUpdate>) -> CoordinatorResult<u64>;

    /// Replace the collection with `records` in the given order, assigning
    /// ids 1..=n, through a shadow table swapped in one transaction
    async fn rebuild_in_order(&self, records: Vec<ArticleRecord>) -> CoordinatorResult<u64>;
}
