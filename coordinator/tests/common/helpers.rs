//! Test helpers and builder patterns for coordinator tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use coordinator::{Coordinator, KeywordCatalog, SqliteStore};
use producer::{ArticleGenerator, MockArticleGenerator};
use shared::{GenerationResult, RunEvent, RunId, RunMode, RunRequest};

use super::fixtures::TestFixtures;

pub type TestCoordinator<G = MockArticleGenerator> = Coordinator<G, SqliteStore>;

/// Builder for coordinators over an in-memory store
pub struct CoordinatorBuilder {
    generator: MockArticleGenerator,
    catalog: KeywordCatalog,
    workers: usize,
}

impl CoordinatorBuilder {
    /// Defaults: no generate expectations, capacity always available
    pub fn new() -> Self {
        let mut generator = MockArticleGenerator::new();
        generator
            .expect_remaining_capacity()
            .returning(|| TestFixtures::RATE_REMAINING)
            .times(0..);
        generator.expect_update_api_key().returning(|_| ()).times(0..);

        Self {
            generator,
            catalog: KeywordCatalog::default(),
            workers: TestFixtures::DEFAULT_WORKERS,
        }
    }

    /// Configure the generator mock with a setup function
    pub fn with_generator<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut MockArticleGenerator),
    {
        setup(&mut self.generator);
        self
    }

    /// Every unit produces a distinct article
    pub fn with_unique_articles(self) -> Self {
        self.with_generator(|generator| {
            generator
                .expect_generate()
                .returning(|_, index, _| TestFixtures::numbered_article(index));
        })
    }

    pub fn with_catalog(mut self, catalog: KeywordCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn build(self) -> (TestCoordinator, Arc<SqliteStore>) {
        build_with(self.generator, self.catalog, self.workers)
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Coordinator over any generator with a fresh in-memory store
pub fn build_with<G: ArticleGenerator + 'static>(
    generator: G,
    catalog: KeywordCatalog,
    workers: usize,
) -> (TestCoordinator<G>, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let coordinator = Coordinator::new(Arc::new(generator), Arc::clone(&store), catalog, workers)
        .unwrap()
        .with_stagger(Duration::from_millis(1));
    (coordinator, store)
}

/// Generator that takes a while per article
pub struct SlowGenerator {
    pub delay: Duration,
}

impl SlowGenerator {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ArticleGenerator for SlowGenerator {
    async fn generate(&self, _seed: &str, index: u64, _length_hint: &str) -> GenerationResult {
        tokio::time::sleep(self.delay).await;
        TestFixtures::numbered_article(index)
    }

    fn remaining_capacity(&self) -> u32 {
        TestFixtures::RATE_REMAINING
    }

    fn update_api_key(&self, _api_key: &str) {}
}

/// Common test operations
pub struct TestHelpers;

impl TestHelpers {
    pub fn fixed(count: u64) -> RunRequest {
        RunRequest::new(TestFixtures::SEED, RunMode::Fixed { count })
    }

    pub fn unbounded() -> RunRequest {
        RunRequest::new(TestFixtures::SEED, RunMode::Unbounded)
    }

    /// Start a run, wait for it, and return every event it emitted
    pub async fn run_to_completion<G: ArticleGenerator + 'static>(
        coordinator: &TestCoordinator<G>,
        request: RunRequest,
    ) -> (RunId, Vec<RunEvent>) {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let run_id = coordinator.start_run(request, events_tx).await.unwrap();
        coordinator.wait_for_run().await.unwrap();

        let mut events = Vec::new();
        while let Ok(event) = events_rx.try_recv() {
            events.push(event);
        }
        (run_id, events)
    }

    /// Start a run whose events are discarded
    pub async fn start_detached<G: ArticleGenerator + 'static>(coordinator: &TestCoordinator<G>, request: RunRequest) -> RunId {
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        coordinator.start_run(request, events_tx).await.unwrap()
    }
}
