//! Main coordinator implementation
//!
//! Bundles the generator, the store, the keyword catalog, run tracking and
//! maintenance behind one facade used by the CLI and the HTTP API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use producer::ArticleGenerator;
use shared::config::validate_worker_limit;
use shared::{
    ArticlePage, ArticleQuery, ArticleRecord, CorrectionReport, DeduplicationReport, NormalizationReport, PurgeReport,
    RenumberReport, RunEvent, RunId, RunRequest, RunSnapshot,
};

use crate::core::{Dispatcher, KeywordCatalog, MaintenanceEngine};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::state::RunStateTracker;
use crate::traits::ArticleStore;

/// Batch generation coordinator
pub struct Coordinator<G, S>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    generator: Arc<G>,
    store: Arc<S>,
    catalog: Arc<KeywordCatalog>,
    tracker: Arc<RunStateTracker>,
    dispatcher: Dispatcher<G, S>,
    maintenance: MaintenanceEngine<S>,

    /// Held by maintenance operations and while a run is being started
    maintenance_gate: Mutex<()>,

    worker_limit: AtomicUsize,

    /// Driver task of the most recent run
    driver: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<G, S> Coordinator<G, S>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    pub fn new(generator: Arc<G>, store: Arc<S>, catalog: KeywordCatalog, worker_limit: usize) -> CoordinatorResult<Self> {
        let worker_limit = validate_worker_limit(worker_limit as i64)?;
        let catalog = Arc::new(catalog);

        Ok(Self {
            dispatcher: Dispatcher::new(Arc::clone(&generator), Arc::clone(&store), Arc::clone(&catalog)),
            maintenance: MaintenanceEngine::new(Arc::clone(&store)),
            generator,
            store,
            catalog,
            tracker: Arc::new(RunStateTracker::new()),
            maintenance_gate: Mutex::new(()),
            worker_limit: AtomicUsize::new(worker_limit),
            driver: std::sync::Mutex::new(None),
        })
    }

    /// Override the delay between submissions
    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.dispatcher = self.dispatcher.with_stagger(stagger);
        self
    }

    // ------------------------------------------------------------------
    // Runs
    // ------------------------------------------------------------------

    /// Accept a run and start dispatching it in the background
    pub async fn start_run(&self, request: RunRequest, events: mpsc::UnboundedSender<RunEvent>) -> CoordinatorResult<RunId> {
        if request.seed.trim().is_empty() {
            return Err(CoordinatorError::ConfigurationError {
                field: "seed must not be empty".to_string(),
            });
        }

        let _gate = self.maintenance_gate.lock().await;
        let run = self.tracker.begin(request)?;
        let handle = self.dispatcher.start(Arc::clone(&run), self.worker_limit(), events);

        let mut driver = self.driver.lock().map_err(|_| CoordinatorError::LockPoisoned {
            resource: "run driver".to_string(),
        })?;
        *driver = Some(handle);

        Ok(run.id())
    }

    /// Request cancellation; returns false if nothing was running
    pub fn stop_run(&self) -> bool {
        let stopped = self.tracker.stop();
        if stopped {
            info!("🛑 Stop requested for current run");
        }
        stopped
    }

    /// Wait for the most recent run to complete, detached units included
    pub async fn wait_for_run(&self) -> CoordinatorResult<()> {
        let handle = self
            .driver
            .lock()
            .map_err(|_| CoordinatorError::LockPoisoned {
                resource: "run driver".to_string(),
            })?
            .take();

        if let Some(handle) = handle {
            handle.await?;
        }
        if let Some(run) = self.tracker.current() {
            run.wait_completed().await;
        }
        Ok(())
    }

    pub fn status(&self) -> RunSnapshot {
        self.tracker.snapshot(self.generator.remaining_capacity())
    }

    pub fn is_running(&self) -> bool {
        self.tracker.is_active()
    }

    /// Worker limit for runs started from now on
    pub fn set_worker_limit(&self, workers: i64) -> CoordinatorResult<usize> {
        let workers = validate_worker_limit(workers)?;
        self.worker_limit.store(workers, Ordering::SeqCst);
        info!("⚙️ Worker limit set to {}", workers);
        Ok(workers)
    }

    pub fn worker_limit(&self) -> usize {
        self.worker_limit.load(Ordering::SeqCst)
    }

    pub fn update_api_key(&self, api_key: &str) {
        self.generator.update_api_key(api_key);
    }

    pub fn tag_categories(&self) -> Vec<String> {
        self.catalog.categories()
    }

    // ------------------------------------------------------------------
    // Articles
    // ------------------------------------------------------------------

    pub async fn get_article(&self, id: i64) -> CoordinatorResult<Option<ArticleRecord>> {
        self.store.get_by_id(id).await
    }

    pub async fn list_articles(&self, query: ArticleQuery) -> CoordinatorResult<ArticlePage> {
        self.store.paginated_query(query).await
    }

    pub async fn toggle_read(&self, id: i64) -> CoordinatorResult<bool> {
        self.store.toggle_read(id).await
    }

    pub async fn delete_article(&self, id: i64) -> CoordinatorResult<bool> {
        self.store.delete_by_id(id).await
    }

    pub async fn clear_articles(&self) -> CoordinatorResult<u64> {
        let _gate = self.maintenance_gate.lock().await;
        let removed = self.store.delete_all().await?;
        warn!("🗑️ Cleared {} articles", removed);
        Ok(removed)
    }

    pub async fn article_count(&self) -> CoordinatorResult<u64> {
        self.store.count().await
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    pub async fn perform_correction(&self) -> CoordinatorResult<CorrectionReport> {
        let _gate = self.maintenance_gate.lock().await;
        self.maintenance.perform_correction().await
    }

    pub async fn deduplicate_titles(&self) -> CoordinatorResult<DeduplicationReport> {
        let _gate = self.maintenance_gate.lock().await;
        self.maintenance.deduplicate_titles().await
    }

    pub async fn purge_failed(&self) -> CoordinatorResult<PurgeReport> {
        let _gate = self.maintenance_gate.lock().await;
        self.maintenance.purge_failed().await
    }

    pub async fn normalize_fields(&self) -> CoordinatorResult<NormalizationReport> {
        let _gate = self.maintenance_gate.lock().await;
        self.maintenance.normalize_fields().await
    }

    /// Renumber ids by creation time; refused while a run is active
    pub async fn renumber_ids(&self) -> CoordinatorResult<RenumberReport> {
        let _gate = self.maintenance_gate.lock().await;
        if self.tracker.is_active() {
            return Err(CoordinatorError::RunInProgress);
        }
        self.maintenance.renumber_ids().await
    }
}
