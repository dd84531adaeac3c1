//! Maintenance engine tests against a real store

use std::sync::Arc;

use shared::{ArticleStatus, CorrectionReport};

use super::common::{at, failed_article, new_article, seeded_store};
use crate::core::MaintenanceEngine;
use crate::error::CoordinatorError;
use crate::services::SqliteStore;
use crate::traits::ArticleStore;

fn engine(store: &SqliteStore) -> MaintenanceEngine<SqliteStore> {
    MaintenanceEngine::new(Arc::new(store.clone()))
}

/// Raw row written without canonicalization, as older databases hold them
fn insert_dirty(store: &SqliteStore, title: &str, tags: &str) {
    let conn = store.conn_for_tests();
    let conn = conn.lock().unwrap();
    conn.execute(
        "INSERT INTO articles (title, tags, content, tag_seed, created_at, status) VALUES (?1, ?2, '', 'x', ?3, 'completed')",
        rusqlite::params![title, tags, crate::services::sqlite_store::format_timestamp(&at(50))],
    )
    .unwrap();
}

#[tokio::test]
async fn test_deduplicate_keeps_earliest_of_each_title() {
    let store = seeded_store(&[("A", 5), ("A", 1), ("B", 2), ("A", 9)]).await;

    let report = engine(&store).deduplicate_titles().await.unwrap();

    assert_eq!(report.duplicate_groups, 1);
    assert_eq!(report.deleted_count, 2);

    let remaining = store.scan_all().await.unwrap();
    let kept: Vec<(i64, &str)> = remaining.iter().map(|r| (r.id, r.title.as_str())).collect();
    assert_eq!(kept, vec![(2, "A"), (3, "B")]);
}

#[tokio::test]
async fn test_deduplicate_without_duplicates_changes_nothing() {
    let store = seeded_store(&[("A", 0), ("B", 1)]).await;

    let report = engine(&store).deduplicate_titles().await.unwrap();

    assert_eq!(report.deleted_count, 0);
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_purge_removes_only_failed() {
    let store = seeded_store(&[("ok", 0)]).await;
    store.insert_article_at(failed_article("bad one"), at(1)).await.unwrap();
    store.insert_article_at(failed_article("bad two"), at(2)).await.unwrap();

    let report = engine(&store).purge_failed().await.unwrap();

    assert_eq!(report.failed_deleted, 2);
    let remaining = store.scan_all().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].status, ArticleStatus::Completed);
}

#[tokio::test]
async fn test_normalize_rewrites_legacy_rows() {
    let store = seeded_store(&[("Clean", 0)]).await;
    insert_dirty(&store, "Using `serde`", "['Rust', \"Serde\"]");
    insert_dirty(&store, "Plain", "[Tech, 'AI']");

    let report = engine(&store).normalize_fields().await.unwrap();

    assert_eq!(report.titles_cleaned, 1);
    assert_eq!(report.tags_cleaned, 2);

    let second = store.get_by_id(2).await.unwrap().unwrap();
    assert_eq!(second.title, "Using serde");
    assert_eq!(second.tags, "Rust,Serde");
    assert_eq!(store.get_by_id(3).await.unwrap().unwrap().tags, "Tech,AI");

    // Already canonical now
    let again = engine(&store).normalize_fields().await.unwrap();
    assert_eq!(again.titles_cleaned + again.tags_cleaned, 0);
}

#[tokio::test]
async fn test_correction_runs_all_steps() {
    let store = seeded_store(&[("A", 0), ("A", 1)]).await;
    store.insert_article_at(failed_article("broken"), at(2)).await.unwrap();
    insert_dirty(&store, "`B`", "[x]");

    let report = engine(&store).perform_correction().await.unwrap();

    assert_eq!(
        report,
        CorrectionReport {
            duplicate_groups: 1,
            deleted_count: 1,
            failed_deleted: 1,
            titles_cleaned: 1,
            tags_cleaned: 1,
        }
    );
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_renumber_orders_by_creation_time() {
    let store = seeded_store(&[("third", 30), ("first", 10), ("second", 20)]).await;
    store.delete_by_id(1).await.unwrap();
    store.insert_article_at(new_article("zeroth", &["x"]), at(0)).await.unwrap();

    let report = engine(&store).renumber_ids().await.unwrap();

    assert_eq!(report.reordered_count, 3);
    let ordered: Vec<(i64, String)> = store
        .scan_all()
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.id, r.title))
        .collect();
    assert_eq!(
        ordered,
        vec![
            (1, "zeroth".to_string()),
            (2, "first".to_string()),
            (3, "second".to_string()),
        ]
    );

    let next = store.insert_article(new_article("fourth", &[])).await.unwrap();
    assert_eq!(next, 4);
}

#[tokio::test]
async fn test_renumber_is_idempotent() {
    let store = seeded_store(&[("b", 2), ("a", 1)]).await;
    let engine = engine(&store);

    engine.renumber_ids().await.unwrap();
    let first = store.scan_all().await.unwrap();
    engine.renumber_ids().await.unwrap();
    let second = store.scan_all().await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_renumber_empty_collection() {
    let store = SqliteStore::open_in_memory().unwrap();

    let report = engine(&store).renumber_ids().await.unwrap();

    assert_eq!(report.reordered_count, 0);
}

#[tokio::test]
async fn test_renumber_failure_leaves_collection_untouched() {
    let store = seeded_store(&[("c", 3), ("a", 1), ("b", 2)]).await;
    let before = store.scan_all().await.unwrap();
    store.fail_rebuild_after(1);

    let err = engine(&store).renumber_ids().await.unwrap_err();

    assert!(matches!(err, CoordinatorError::IntegrityFailure { .. }));
    assert_eq!(store.scan_all().await.unwrap(), before);

    // The shadow table was rolled back with the transaction
    store.fail_rebuild_after(usize::MAX);
    let report = engine(&store).renumber_ids().await.unwrap();
    assert_eq!(report.reordered_count, 3);
}
