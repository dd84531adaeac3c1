//! Core shared types and identifiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::errors::SharedError;

/// Unique identifier for a batch run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, SharedError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| SharedError::InvalidUuid { input: s.to_string() })
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Articles
// ============================================================================

/// Status of a persisted article
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Completed,
    Failed,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Completed => "completed",
            ArticleStatus::Failed => "failed",
        }
    }
}

impl FromStr for ArticleStatus {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(ArticleStatus::Completed),
            "failed" => Ok(ArticleStatus::Failed),
            other => Err(SharedError::unknown_variant("article status", other)),
        }
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored article, as held by the article store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: i64,
    pub title: String,
    /// Flat comma-joined tag list, exactly as stored
    pub tags: String,
    pub content: String,
    pub seed: String,
    pub created_at: DateTime<Utc>,
    pub status: ArticleStatus,
    pub error_message: Option<String>,
    pub is_read: bool,
}

impl ArticleRecord {
    /// Ordered tag list parsed from the stored form
    pub fn tag_set(&self) -> Vec<String> {
        split_tags(&self.tags)
    }

    /// Key used for every "earliest first" decision: creation time, then id
    pub fn chronological_key(&self) -> (DateTime<Utc>, i64) {
        (self.created_at, self.id)
    }
}

/// Listing row returned by paginated queries (content omitted)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub id: i64,
    pub title: String,
    pub tags: Vec<String>,
    pub seed: String,
    pub created_at: DateTime<Utc>,
    pub status: ArticleStatus,
    pub error_message: Option<String>,
    pub is_read: bool,
}

/// Insert request for a new article
#[derive(Clone, Debug, PartialEq)]
pub struct NewArticle {
    pub title: String,
    pub tags: Vec<String>,
    pub content: String,
    pub seed: String,
    pub status: ArticleStatus,
    pub error_message: Option<String>,
}

/// Replacement title/tags for one record, produced by normalization
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldUpdate {
    pub id: i64,
    pub title: String,
    pub tags: String,
}

/// Split a stored tag string into its entries
pub fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Generation collaborator
// ============================================================================

/// Parsed output of one successful generation request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArticle {
    pub title: String,
    pub tags: Vec<String>,
    pub content: String,
    pub raw_response: String,
}

/// Failure reported by the generation collaborator
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationFailure {
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("service unavailable")]
    ServiceUnavailable,

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("server error: {0}")]
    ServerError(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

pub type GenerationResult = Result<GeneratedArticle, GenerationFailure>;

// ============================================================================
// Runs
// ============================================================================

/// Count value requesting an unbounded run
pub const UNBOUNDED_COUNT: i64 = -1;

/// How many units a run should produce
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunMode {
    Fixed { count: u64 },
    Unbounded,
}

impl RunMode {
    /// `-1` means "until stopped"; other negative counts are rejected
    pub fn from_count(count: i64) -> Result<Self, SharedError> {
        match count {
            UNBOUNDED_COUNT => Ok(RunMode::Unbounded),
            count if count < 0 => Err(SharedError::invalid_config("count", count)),
            count => Ok(RunMode::Fixed { count: count as u64 }),
        }
    }

    pub fn total(&self) -> Option<u64> {
        match self {
            RunMode::Fixed { count } => Some(*count),
            RunMode::Unbounded => None,
        }
    }
}

/// Lifecycle state of a run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Stopping,
    Completed,
}

impl RunStatus {
    /// Running or draining after a stop request
    pub fn is_active(&self) -> bool {
        matches!(self, RunStatus::Running | RunStatus::Stopping)
    }
}

/// Target article length when none is given
pub const DEFAULT_LENGTH_HINT: &str = "6000";

/// Parameters of a start request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub seed: String,
    pub mode: RunMode,
    pub sequential: bool,
    pub length_hint: String,
}

impl RunRequest {
    pub fn new(seed: impl Into<String>, mode: RunMode) -> Self {
        Self {
            seed: seed.into(),
            mode,
            sequential: false,
            length_hint: DEFAULT_LENGTH_HINT.to_string(),
        }
    }

    pub fn sequential(mut self, sequential: bool) -> Self {
        self.sequential = sequential;
        self
    }

    pub fn with_length_hint(mut self, length_hint: impl Into<String>) -> Self {
        self.length_hint = length_hint.into();
        self
    }
}

/// Point-in-time view of the current (or last) run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: Option<RunId>,
    pub seed: String,
    pub status: RunStatus,
    pub is_running: bool,
    pub processed: u64,
    pub total: Option<u64>,
    pub success_count: u64,
    pub error_count: u64,
    pub rate_remaining: u32,
    pub elapsed_seconds: f64,
    pub average_seconds_per_unit: f64,
}

/// Notifications emitted to the caller of a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    Progress {
        run_id: RunId,
        processed: u64,
        total: Option<u64>,
        success_count: u64,
        error_count: u64,
        rate_remaining: u32,
    },
    Completed {
        run_id: RunId,
        total: u64,
        success_count: u64,
        error_count: u64,
    },
}

// ============================================================================
// Queries
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadFilter {
    #[default]
    All,
    Read,
    Unread,
}

impl ReadFilter {
    pub fn parse_or_default(value: &str) -> Self {
        match value {
            "read" => ReadFilter::Read,
            "unread" => ReadFilter::Unread,
            _ => ReadFilter::All,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Completed,
    Failed,
}

impl StatusFilter {
    pub fn parse_or_default(value: &str) -> Self {
        match value {
            "completed" => StatusFilter::Completed,
            "failed" => StatusFilter::Failed,
            _ => StatusFilter::All,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Id,
    Title,
    #[default]
    CreatedAt,
    Status,
}

impl SortField {
    /// Unknown fields fall back to creation time
    pub fn parse_or_default(value: &str) -> Self {
        match value {
            "id" => SortField::Id,
            "title" => SortField::Title,
            "status" => SortField::Status,
            _ => SortField::CreatedAt,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Title => "title",
            SortField::CreatedAt => "created_at",
            SortField::Status => "status",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Anything but "asc" (case-insensitive) sorts descending
    pub fn parse_or_default(value: &str) -> Self {
        if value.eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filters, sorting and paging for article listings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleQuery {
    pub page: u32,
    pub per_page: u32,
    pub read_filter: ReadFilter,
    pub title_search: String,
    pub tag_search: String,
    pub status_filter: StatusFilter,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
}

impl Default for ArticleQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
            read_filter: ReadFilter::All,
            title_search: String::new(),
            tag_search: String::new(),
            status_filter: StatusFilter::All,
            sort_field: SortField::CreatedAt,
            sort_order: SortOrder::Desc,
        }
    }
}

/// One page of article listings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArticlePage {
    pub articles: Vec<ArticleSummary>,
    pub total_count: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u64,
}

// ============================================================================
// Maintenance reports
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeduplicationReport {
    pub duplicate_groups: u64,
    pub deleted_count: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    pub failed_deleted: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub titles_cleaned: u64,
    pub tags_cleaned: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenumberReport {
    pub reordered_count: u64,
}

/// Combined result of deduplicate, purge and normalize
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionReport {
    pub duplicate_groups: u64,
    pub deleted_count: u64,
    pub failed_deleted: u64,
    pub titles_cleaned: u64,
    pub tags_cleaned: u64,
}

impl CorrectionReport {
    pub fn merge(
        dedup: DeduplicationReport,
        purge: PurgeReport,
        normalize: NormalizationReport,
    ) -> Self {
        Self {
            duplicate_groups: dedup.duplicate_groups,
            deleted_count: dedup.deleted_count,
            failed_deleted: purge.failed_deleted,
            titles_cleaned: normalize.titles_cleaned,
            tags_cleaned: normalize.tags_cleaned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_mode_from_count() {
        assert_eq!(RunMode::from_count(-1).unwrap(), RunMode::Unbounded);
        assert_eq!(RunMode::from_count(0).unwrap(), RunMode::Fixed { count: 0 });
        assert_eq!(RunMode::from_count(5).unwrap().total(), Some(5));
        assert_eq!(RunMode::Unbounded.total(), None);
    }

    #[test]
    fn test_run_mode_rejects_counts_below_unbounded() {
        assert!(matches!(
            RunMode::from_count(-2),
            Err(SharedError::InvalidConfig { ref field, ref value }) if field == "count" && value == "-2"
        ));
        assert!(RunMode::from_count(i64::MIN).is_err());
    }

    #[test]
    fn test_article_status_parsing() {
        assert_eq!("completed".parse::<ArticleStatus>().unwrap(), ArticleStatus::Completed);
        assert_eq!("failed".parse::<ArticleStatus>().unwrap(), ArticleStatus::Failed);
        assert!("pending".parse::<ArticleStatus>().is_err());
    }

    #[test]
    fn test_query_parameter_fallbacks() {
        assert_eq!(SortField::parse_or_default("bogus"), SortField::CreatedAt);
        assert_eq!(SortField::parse_or_default("title").column(), "title");
        assert_eq!(SortOrder::parse_or_default("ASC"), SortOrder::Asc);
        assert_eq!(SortOrder::parse_or_default("sideways"), SortOrder::Desc);
        assert_eq!(ReadFilter::parse_or_default("unread"), ReadFilter::Unread);
        assert_eq!(StatusFilter::parse_or_default("anything"), StatusFilter::All);
    }

    #[test]
    fn test_split_tags_skips_blank_entries() {
        assert_eq!(split_tags("Tech, AI,,  "), vec!["Tech".to_string(), "AI".to_string()]);
        assert!(split_tags("").is_empty());
    }

    #[test]
    fn test_run_event_serialization_is_tagged() {
        let event = RunEvent::Completed {
            run_id: RunId::new(),
            total: 3,
            success_count: 1,
            error_count: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "completed");
        assert_eq!(json["success_count"], 1);
    }
}
