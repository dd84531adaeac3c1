//! Consistency-restoring rewrites of the article collection
//!
//! Each operation scans the collection, plans its changes as plain data and
//! hands them to the store as a single transactional batch. Planning is pure
//! so the rules can be tested without a database.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use shared::{
    ArticleRecord, ArticleStatus, CorrectionReport, DeduplicationReport, FieldUpdate, NormalizationReport,
    PurgeReport, RenumberReport,
};

use crate::error::CoordinatorResult;
use crate::traits::ArticleStore;

// ============================================================================
// Field canonicalization
// ============================================================================

/// Title with every backtick removed
pub fn canonical_title(title: &str) -> String {
    title.replace('`', "")
}

/// Canonical stored form of a tag string
///
/// A bracketed value is read as a list literal first so quoted commas stay
/// inside their entry; otherwise the value is split on commas.
pub fn canonical_tags(stored: &str) -> String {
    let raw = stored.trim();
    let entries: Vec<String> = if raw.starts_with('[') && raw.ends_with(']') {
        parse_list_literal(raw).unwrap_or_else(|| {
            raw.replace(['[', ']'], "")
                .split(',')
                .map(str::to_string)
                .collect()
        })
    } else {
        raw.split(',').map(str::to_string).collect()
    };
    canonical_tag_list(&entries)
}

/// Canonical stored form of an already split tag list
pub fn canonical_tag_list<T: AsRef<str>>(entries: &[T]) -> String {
    entries
        .iter()
        .filter_map(|entry| clean_tag(entry.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

fn clean_tag(entry: &str) -> Option<String> {
    let unbracketed: String = entry.chars().filter(|c| !matches!(c, '[' | ']' | '{' | '}')).collect();
    let cleaned: String = unbracketed.trim().chars().filter(|c| !matches!(c, '\'' | '"')).collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Parse `['a', "b, c"]`; any unquoted entry makes the literal invalid
fn parse_list_literal(raw: &str) -> Option<Vec<String>> {
    let inner = raw.strip_prefix('[')?.strip_suffix(']')?;
    let mut chars = inner.chars().peekable();
    let mut items = Vec::new();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(&quote) = chars.peek() else {
            break;
        };
        if quote != '\'' && quote != '"' {
            return None;
        }
        chars.next();

        let mut item = String::new();
        loop {
            match chars.next()? {
                '\\' => item.push(chars.next()?),
                c if c == quote => break,
                c => item.push(c),
            }
        }
        items.push(item);

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        match chars.next() {
            None => break,
            Some(',') => continue,
            Some(_) => return None,
        }
    }

    Some(items)
}

// ============================================================================
// Planning
// ============================================================================

/// Ids to delete so each title keeps only its earliest record
pub fn plan_deduplication(records: &[ArticleRecord]) -> (DeduplicationReport, Vec<i64>) {
    let mut by_title: HashMap<&str, Vec<&ArticleRecord>> = HashMap::new();
    for record in records {
        by_title.entry(record.title.as_str()).or_default().push(record);
    }

    let mut report = DeduplicationReport::default();
    let mut doomed = Vec::new();
    for group in by_title.values_mut().filter(|group| group.len() > 1) {
        group.sort_by_key(|record| record.chronological_key());
        report.duplicate_groups += 1;
        doomed.extend(group.iter().skip(1).map(|record| record.id));
    }

    doomed.sort_unstable();
    report.deleted_count = doomed.len() as u64;
    (report, doomed)
}

/// Ids of every failed record
pub fn plan_purge(records: &[ArticleRecord]) -> Vec<i64> {
    records
        .iter()
        .filter(|record| record.status == ArticleStatus::Failed)
        .map(|record| record.id)
        .collect()
}

/// Updates for records whose canonical title or tags differ from storage
pub fn plan_normalization(records: &[ArticleRecord]) -> (NormalizationReport, Vec<FieldUpdate>) {
    let mut report = NormalizationReport::default();
    let mut updates = Vec::new();

    for record in records {
        let title = canonical_title(&record.title);
        let tags = canonical_tags(&record.tags);
        let title_changed = title != record.title;
        let tags_changed = tags != record.tags;

        if title_changed {
            report.titles_cleaned += 1;
        }
        if tags_changed {
            report.tags_cleaned += 1;
        }
        if title_changed || tags_changed {
            updates.push(FieldUpdate { id: record.id, title, tags });
        }
    }

    (report, updates)
}

/// Records in `(created_at, id)` order
pub fn chronological_order(mut records: Vec<ArticleRecord>) -> Vec<ArticleRecord> {
    records.sort_by_key(|record| record.chronological_key());
    records
}

// ============================================================================
// Engine
// ============================================================================

/// Runs maintenance operations against a store
pub struct MaintenanceEngine<S>
where
    S: ArticleStore + 'static,
{
    store: Arc<S>,
}

impl<S> MaintenanceEngine<S>
where
    S: ArticleStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn deduplicate_titles(&self) -> CoordinatorResult<DeduplicationReport> {
        let records = self.store.scan_all().await?;
        let (mut report, doomed) = plan_deduplication(&records);

        if !doomed.is_empty() {
            report.deleted_count = self.store.delete_batch(doomed).await?;
        }

        info!(
            "🧹 Deduplicated titles: {} groups, {} records deleted",
            report.duplicate_groups, report.deleted_count
        );
        Ok(report)
    }

    pub async fn purge_failed(&self) -> CoordinatorResult<PurgeReport> {
        let records = self.store.scan_all().await?;
        let doomed = plan_purge(&records);

        let failed_deleted = if doomed.is_empty() {
            0
        } else {
            self.store.delete_batch(doomed).await?
        };

        info!("🧹 Purged {} failed records", failed_deleted);
        Ok(PurgeReport { failed_deleted })
    }

    pub async fn normalize_fields(&self) -> CoordinatorResult<NormalizationReport> {
        let records = self.store.scan_all().await?;
        let (report, updates) = plan_normalization(&records);

        if !updates.is_empty() {
            self.store.update_fields_batch(updates).await?;
        }

        info!(
            "🧹 Normalized fields: {} titles, {} tag lists",
            report.titles_cleaned, report.tags_cleaned
        );
        Ok(report)
    }

    /// Deduplicate, purge failed records, then normalize
    pub async fn perform_correction(&self) -> CoordinatorResult<CorrectionReport> {
        let dedup = self.deduplicate_titles().await?;
        let purge = self.purge_failed().await?;
        let normalize = self.normalize_fields().await?;
        Ok(CorrectionReport::merge(dedup, purge, normalize))
    }

    /// Reassign ids 1..=n in chronological order
    pub async fn renumber_ids(&self) -> CoordinatorResult<RenumberReport> {
        let records = self.store.scan_all().await?;
        if records.is_empty() {
            return Ok(RenumberReport { reordered_count: 0 });
        }

        let ordered = chronological_order(records);
        let reordered_count = self.store.rebuild_in_order(ordered).await?;

        info!("🔢 Renumbered {} records by creation time", reordered_count);
        Ok(RenumberReport { reordered_count })
    }
}
