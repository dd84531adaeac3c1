//! Bounded worker pool driving one run

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::{mpsc, watch, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};

use producer::ArticleGenerator;
use shared::config::{MAX_WORKERS, MIN_WORKERS};
use shared::{run_debug, run_error, run_info, run_warn, ArticleStatus, GenerationFailure, NewArticle, RunEvent, RunMode};

use crate::core::keywords::KeywordCatalog;
use crate::core::maintenance::canonical_title;
use crate::error::CoordinatorResult;
use crate::state::Run;
use crate::traits::ArticleStore;

/// Delay between consecutive submissions
pub const DEFAULT_STAGGER: Duration = Duration::from_millis(100);

/// How a single unit resolved
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    Persisted { id: i64, title: String },
    DuplicateTitle { title: String },
    GenerationFailed(GenerationFailure),
}

impl UnitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UnitOutcome::Persisted { .. })
    }
}

/// Submits units for a run and persists their results
pub struct Dispatcher<G, S>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    generator: Arc<G>,
    store: Arc<S>,
    catalog: Arc<KeywordCatalog>,
    /// Serializes title check and insert across units
    persist_gate: Arc<Mutex<()>>,
    stagger: Duration,
}

impl<G, S> Clone for Dispatcher<G, S>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    fn clone(&self) -> Self {
        Self {
            generator: Arc::clone(&self.generator),
            store: Arc::clone(&self.store),
            catalog: Arc::clone(&self.catalog),
            persist_gate: Arc::clone(&self.persist_gate),
            stagger: self.stagger,
        }
    }
}

impl<G, S> Dispatcher<G, S>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    pub fn new(generator: Arc<G>, store: Arc<S>, catalog: Arc<KeywordCatalog>) -> Self {
        Self {
            generator,
            store,
            catalog,
            persist_gate: Arc::new(Mutex::new(())),
            stagger: DEFAULT_STAGGER,
        }
    }

    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    /// Spawn the run driver and return immediately
    pub fn start(&self, run: Arc<Run>, worker_limit: usize, events: mpsc::UnboundedSender<RunEvent>) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.drive(run, worker_limit, events).await })
    }

    async fn drive(self, run: Arc<Run>, worker_limit: usize, events: mpsc::UnboundedSender<RunEvent>) {
        let workers = worker_limit.clamp(MIN_WORKERS, MAX_WORKERS);
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut cancel = run.subscribe_cancel();
        let mut units: JoinSet<()> = JoinSet::new();

        run_info!(
            run.id(),
            "🚀 Starting run for seed '{}' ({:?}, {} workers)",
            run.request().seed,
            run.mode(),
            workers
        );

        match run.mode() {
            RunMode::Fixed { count } => {
                let mut cancelled = false;
                for index in 1..=count {
                    let Some(permit) = self.reserve_worker(&semaphore, &mut cancel).await else {
                        cancelled = true;
                        break;
                    };
                    self.spawn_unit(&mut units, &run, index, permit, &events);

                    if index < count && !self.pause(&mut cancel).await {
                        cancelled = true;
                        break;
                    }
                }

                if !cancelled {
                    cancelled = !self.await_units(&run, &mut units, &mut cancel).await;
                }
                if cancelled {
                    // Detached units keep the run in Stopping until they resolve
                    run_info!(run.id(), "🛑 Stop requested, detaching {} in-flight units", units.len());
                    units.detach_all();
                }
            }
            RunMode::Unbounded => {
                let mut index: u64 = 1;
                while let Some(permit) = self.reserve_worker(&semaphore, &mut cancel).await {
                    self.spawn_unit(&mut units, &run, index, permit, &events);
                    index += 1;

                    while let Some(joined) = units.try_join_next() {
                        log_join(&run, joined);
                    }
                    if !self.pause(&mut cancel).await {
                        break;
                    }
                }

                run_info!(run.id(), "🛑 Stop requested, draining {} in-flight units", units.len());
                while let Some(joined) = units.join_next().await {
                    log_join(&run, joined);
                }
            }
        }

        let counters = run.finish(&events);
        if counters.in_flight > 0 {
            run_debug!(run.id(), "Driver finished, waiting on {} detached units", counters.in_flight);
        }
    }

    /// Wait for a free worker slot; None once cancellation is requested
    async fn reserve_worker(&self, semaphore: &Arc<Semaphore>, cancel: &mut watch::Receiver<bool>) -> Option<OwnedSemaphorePermit> {
        let stop_requested = *cancel.borrow();
        if stop_requested {
            return None;
        }
        tokio::select! {
            permit = Arc::clone(semaphore).acquire_owned() => permit.ok(),
            _ = cancelled(cancel) => None,
        }
    }

    /// Stagger sleep; false if cancellation arrived first
    async fn pause(&self, cancel: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.stagger) => true,
            _ = cancelled(cancel) => false,
        }
    }

    /// Join every unit; false if cancellation interrupted the wait
    async fn await_units(&self, run: &Run, units: &mut JoinSet<()>, cancel: &mut watch::Receiver<bool>) -> bool {
        loop {
            tokio::select! {
                joined = units.join_next() => match joined {
                    Some(joined) => log_join(run, joined),
                    None => return true,
                },
                _ = cancelled(cancel) => return false,
            }
        }
    }

    fn spawn_unit(
        &self,
        units: &mut JoinSet<()>,
        run: &Arc<Run>,
        index: u64,
        permit: OwnedSemaphorePermit,
        events: &mpsc::UnboundedSender<RunEvent>,
    ) {
        let dispatcher = self.clone();
        let guard = run.track_unit(events);
        let run = Arc::clone(run);
        let events = events.clone();
        units.spawn(async move {
            let _permit = permit;
            let _guard = guard;
            dispatcher.process_unit(&run, index, &events).await;
        });
    }

    /// Generate, persist and count one unit
    ///
    /// Every failure is absorbed here: the unit is counted as an error and
    /// its siblings keep running.
    pub async fn process_unit(&self, run: &Run, index: u64, events: &mpsc::UnboundedSender<RunEvent>) {
        if !run.is_running() {
            run_debug!(run.id(), "Unit {} abandoned, run no longer active", index);
            return;
        }

        let request = run.request();
        let seed = self.catalog.composite_seed(&request.seed, index, request.sequential);

        let outcome = AssertUnwindSafe(self.generate_and_persist(index, &seed, &request.length_hint))
            .catch_unwind()
            .await;

        let success = match outcome {
            Ok(Ok(outcome)) => {
                match &outcome {
                    UnitOutcome::Persisted { id, title } => {
                        run_info!(run.id(), "✅ Unit {} saved as article {}: {}", index, id, title);
                    }
                    UnitOutcome::DuplicateTitle { title } => {
                        run_warn!(run.id(), "♻️ Unit {} duplicate title, not saved: {}", index, title);
                    }
                    UnitOutcome::GenerationFailed(failure) => {
                        run_warn!(run.id(), "⚠️ Unit {} generation failed: {}", index, failure);
                    }
                }
                outcome.is_success()
            }
            Ok(Err(e)) => {
                run_error!(run.id(), "❌ Unit {} could not be persisted: {}", index, e);
                false
            }
            Err(_) => {
                run_error!(run.id(), "💥 Unit {} panicked", index);
                false
            }
        };

        let rate_remaining = self.generator.remaining_capacity();
        run.record_outcome(success, rate_remaining, events);
    }

    async fn generate_and_persist(&self, index: u64, seed: &str, length_hint: &str) -> CoordinatorResult<UnitOutcome> {
        let article = match self.generator.generate(seed, index, length_hint).await {
            Ok(article) => article,
            Err(failure) => return Ok(UnitOutcome::GenerationFailed(failure)),
        };

        let title = canonical_title(&article.title);
        let _gate = self.persist_gate.lock().await;

        if self.store.title_exists(&title).await? {
            return Ok(UnitOutcome::DuplicateTitle { title });
        }

        let id = self
            .store
            .insert_article(NewArticle {
                title: title.clone(),
                tags: article.tags,
                content: article.content,
                seed: seed.to_string(),
                status: ArticleStatus::Completed,
                error_message: None,
            })
            .await?;

        Ok(UnitOutcome::Persisted { id, title })
    }
}

/// Resolves once the cancellation flag is set
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let closed = cancel.wait_for(|stop| *stop).await.is_err();
    if closed {
        // Sender dropped with the run; nothing can cancel any more
        std::future::pending::<()>().await;
    }
}

fn log_join(run: &Run, joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        run_error!(run.id(), "💥 Unit task failed: {}", e);
    }
}
