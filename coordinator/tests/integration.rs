//! End-to-end tests for generation runs
//!
//! Runs go through the coordinator facade with a mocked (or slow) generator
//! and a real in-memory SQLite store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use coordinator::{ArticleStore, CoordinatorError, KeywordCatalog};
use shared::{GenerationFailure, RunEvent, RunStatus};

mod common;
use common::helpers::build_with;
use common::{CoordinatorBuilder, SlowGenerator, TestFixtures, TestHelpers};

/// Duplicate titles and generation failures both count as errors
#[tokio::test]
async fn test_mixed_outcomes_are_counted() {
    // Arrange
    let (coordinator, store) = CoordinatorBuilder::new()
        .with_generator(|generator| {
            generator.expect_generate().times(3).returning(|_, index, _| match index {
                3 => Err(GenerationFailure::ServerError("500 Internal Server Error".to_string())),
                _ => TestFixtures::article("A"),
            });
        })
        .build();

    // Act
    let (run_id, events) = TestHelpers::run_to_completion(&coordinator, TestHelpers::fixed(3)).await;

    // Assert
    let snapshot = coordinator.status();
    assert_eq!(snapshot.run_id, Some(run_id));
    assert_eq!(snapshot.processed, 3);
    assert_eq!(snapshot.success_count, 1);
    assert_eq!(snapshot.error_count, 2);
    assert_eq!(snapshot.status, RunStatus::Completed);
    assert!(!snapshot.is_running);
    assert_eq!(store.count().await.unwrap(), 1);

    assert_eq!(
        events.last(),
        Some(&RunEvent::Completed {
            run_id,
            total: 3,
            success_count: 1,
            error_count: 2,
        })
    );
}

/// Progress events report every unit in counter order
#[tokio::test]
async fn test_fixed_run_emits_progress_per_unit() {
    // Arrange
    let (coordinator, store) = CoordinatorBuilder::new().with_unique_articles().with_workers(4).build();

    // Act
    let (_, events) = TestHelpers::run_to_completion(&coordinator, TestHelpers::fixed(12)).await;

    // Assert
    let processed: Vec<u64> = events
        .iter()
        .filter_map(|event| match event {
            RunEvent::Progress { processed, total, .. } => {
                assert_eq!(*total, Some(12));
                Some(*processed)
            }
            RunEvent::Completed { .. } => None,
        })
        .collect();
    assert_eq!(processed, (1..=12).collect::<Vec<u64>>());

    let snapshot = coordinator.status();
    assert_eq!(snapshot.success_count + snapshot.error_count, snapshot.processed);
    assert_eq!(snapshot.success_count, 12);
    assert_eq!(snapshot.total, Some(12));
    assert_eq!(store.count().await.unwrap(), 12);
}

/// Sequential mode pairs each unit with the next category keyword
#[tokio::test]
async fn test_sequential_seeds_cycle_keywords() {
    // Arrange
    let seen: Arc<Mutex<BTreeMap<u64, String>>> = Arc::new(Mutex::new(BTreeMap::new()));
    let recorder = Arc::clone(&seen);
    let (coordinator, _store) = CoordinatorBuilder::new()
        .with_catalog(TestFixtures::travel_catalog())
        .with_generator(move |generator| {
            generator.expect_generate().returning(move |seed, index, _| {
                recorder.lock().unwrap().insert(index, seed.to_string());
                TestFixtures::numbered_article(index)
            });
        })
        .build();

    // Act
    TestHelpers::run_to_completion(&coordinator, TestHelpers::fixed(3).sequential(true)).await;

    // Assert
    let seeds: Vec<String> = seen.lock().unwrap().values().cloned().collect();
    assert_eq!(seeds, vec!["travel, beach", "travel, mountain", "travel, beach"]);
}

/// Seeds that are not a catalog category go to the generator as given
#[tokio::test]
async fn test_free_text_seed_passes_through() {
    // Arrange
    let (coordinator, _store) = CoordinatorBuilder::new()
        .with_catalog(TestFixtures::travel_catalog())
        .with_generator(|generator| {
            generator
                .expect_generate()
                .withf(|seed, _, length| seed.to_string() == "rust async" && length.to_string() == "3000")
                .times(1)
                .returning(|_, index, _| TestFixtures::numbered_article(index));
        })
        .build();
    let request = shared::RunRequest::new("rust async", shared::RunMode::Fixed { count: 1 }).with_length_hint("3000");

    // Act
    TestHelpers::run_to_completion(&coordinator, request).await;

    // Assert
    assert_eq!(coordinator.status().success_count, 1);
}

/// A second run is refused while one is running
#[tokio::test]
async fn test_second_run_rejected_while_running() {
    // Arrange
    let (coordinator, _store) = build_with(
        SlowGenerator::new(Duration::from_millis(200)),
        KeywordCatalog::default(),
        TestFixtures::DEFAULT_WORKERS,
    );
    TestHelpers::start_detached(&coordinator, TestHelpers::fixed(20)).await;

    // Act
    let (events_tx, _events_rx) = tokio::sync::mpsc::unbounded_channel();
    let second = coordinator.start_run(TestHelpers::fixed(1), events_tx).await;

    // Assert
    assert!(matches!(second, Err(CoordinatorError::RunInProgress)));
    assert!(coordinator.is_running());

    coordinator.stop_run();
    coordinator.wait_for_run().await.unwrap();
}

/// Stop ends a long fixed run early and leaves it not running
#[tokio::test]
async fn test_stop_ends_fixed_run_early() {
    // Arrange
    let (coordinator, _store) = build_with(SlowGenerator::new(Duration::from_millis(50)), KeywordCatalog::default(), 3);
    TestHelpers::start_detached(&coordinator, TestHelpers::fixed(100)).await;
    tokio::time::sleep(Duration::from_millis(120)).await;

    // Act
    let stopped = coordinator.stop_run();
    coordinator.wait_for_run().await.unwrap();

    // Assert
    assert!(stopped);
    assert!(!coordinator.stop_run());
    let snapshot = coordinator.status();
    assert!(!snapshot.is_running);
    assert_eq!(snapshot.status, RunStatus::Completed);
    assert!(snapshot.processed < 100);
}

/// Units already generating when a stop arrives finish before the run does
#[tokio::test]
async fn test_stopped_run_stays_active_until_units_resolve() {
    // Arrange
    let (coordinator, store) = build_with(SlowGenerator::new(Duration::from_millis(200)), KeywordCatalog::default(), 3);
    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    coordinator.start_run(TestHelpers::fixed(5), events_tx).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Act
    assert!(coordinator.stop_run());
    let stopping = coordinator.status();
    let renumber_while_stopping = coordinator.renumber_ids().await;
    coordinator.wait_for_run().await.unwrap();
    let finished = coordinator.status();
    let stored = store.count().await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    // Assert
    assert!(stopping.is_running);
    assert_eq!(stopping.status, RunStatus::Stopping);
    assert!(matches!(renumber_while_stopping, Err(CoordinatorError::RunInProgress)));

    assert!(!finished.is_running);
    assert_eq!(finished.status, RunStatus::Completed);
    assert!(finished.processed >= 1);
    assert_eq!(finished.success_count, stored);
    assert_eq!(coordinator.status().processed, finished.processed);
    assert_eq!(store.count().await.unwrap(), stored);

    let mut completed = Vec::new();
    while let Ok(event) = events_rx.try_recv() {
        if let RunEvent::Completed { success_count, .. } = event {
            completed.push(success_count);
        }
    }
    assert_eq!(completed, vec![stored]);
}

/// Unbounded runs keep going until stopped and never report completion
#[tokio::test]
async fn test_unbounded_run_until_stopped() {
    // Arrange
    let (coordinator, store) = CoordinatorBuilder::new().with_unique_articles().build();
    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    coordinator.start_run(TestHelpers::unbounded(), events_tx).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Act
    coordinator.stop_run();
    coordinator.wait_for_run().await.unwrap();

    // Assert
    let snapshot = coordinator.status();
    assert!(!snapshot.is_running);
    assert_eq!(snapshot.total, None);
    assert!(snapshot.processed >= 1);
    assert_eq!(store.count().await.unwrap(), snapshot.success_count);

    while let Ok(event) = events_rx.try_recv() {
        assert!(matches!(event, RunEvent::Progress { total: None, .. }));
    }
}

/// Renumbering waits for no active run
#[tokio::test]
async fn test_renumber_refused_during_run() {
    // Arrange
    let (coordinator, _store) = build_with(
        SlowGenerator::new(Duration::from_millis(100)),
        KeywordCatalog::default(),
        TestFixtures::DEFAULT_WORKERS,
    );
    TestHelpers::start_detached(&coordinator, TestHelpers::fixed(50)).await;

    // Act
    let during = coordinator.renumber_ids().await;
    coordinator.stop_run();
    coordinator.wait_for_run().await.unwrap();
    let after = coordinator.renumber_ids().await;

    // Assert
    assert!(matches!(during, Err(CoordinatorError::RunInProgress)));
    assert!(after.is_ok());
}

/// A finished run does not block the next one
#[tokio::test]
async fn test_new_run_after_completion() {
    // Arrange
    let (coordinator, store) = CoordinatorBuilder::new().with_unique_articles().build();
    let (first, _) = TestHelpers::run_to_completion(&coordinator, TestHelpers::fixed(2)).await;

    // Act
    let (second, _) = TestHelpers::run_to_completion(&coordinator, TestHelpers::fixed(1)).await;

    // Assert
    assert_ne!(first, second);
    assert_eq!(coordinator.status().processed, 1);
    // "Article 1" already exists from the first run
    assert_eq!(coordinator.status().error_count, 1);
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_empty_seed_rejected() {
    let (coordinator, _store) = CoordinatorBuilder::new().build();
    let (events_tx, _events_rx) = tokio::sync::mpsc::unbounded_channel();

    let result = coordinator
        .start_run(shared::RunRequest::new("   ", shared::RunMode::Fixed { count: 1 }), events_tx)
        .await;

    assert!(matches!(result, Err(CoordinatorError::ConfigurationError { .. })));
    assert!(!coordinator.is_running());
}

#[tokio::test]
async fn test_worker_limit_bounds() {
    let (coordinator, _store) = CoordinatorBuilder::new().build();

    assert!(coordinator.set_worker_limit(0).is_err());
    assert!(coordinator.set_worker_limit(11).is_err());
    assert_eq!(coordinator.worker_limit(), TestFixtures::DEFAULT_WORKERS);
    assert_eq!(coordinator.set_worker_limit(10).unwrap(), 10);
    assert_eq!(coordinator.worker_limit(), 10);
}

/// Correction through the facade after a run with duplicates and failures
#[tokio::test]
async fn test_correction_after_run() {
    // Arrange
    let (coordinator, store) = CoordinatorBuilder::new().with_unique_articles().build();
    TestHelpers::run_to_completion(&coordinator, TestHelpers::fixed(3)).await;
    let failed = shared::NewArticle {
        title: "Broken".to_string(),
        tags: vec![],
        content: String::new(),
        seed: "travel".to_string(),
        status: shared::ArticleStatus::Failed,
        error_message: Some("timeout".to_string()),
    };
    store.insert_article(failed).await.unwrap();

    // Act
    let report = coordinator.perform_correction().await.unwrap();

    // Assert
    assert_eq!(report.failed_deleted, 1);
    assert_eq!(report.deleted_count, 0);
    assert_eq!(coordinator.article_count().await.unwrap(), 3);
}
