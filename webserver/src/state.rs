//! Webserver state management
//!
//! Everything the handlers share: the coordinator, the live settings and
//! the status log shown alongside run progress.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, RwLock};

use coordinator::{ArticleStore, Coordinator};
use producer::ArticleGenerator;
use shared::{RunEvent, Settings};

/// Lines kept in the status log
pub const MAX_LOG_LINES: usize = 200;

/// Human-readable log of the current batch
#[derive(Debug, Default)]
pub struct StatusLog {
    lines: Mutex<Vec<String>>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh log for a new batch
    pub fn reset(&self, first_line: impl Into<String>) {
        let mut lines = self.lock();
        lines.clear();
        lines.push(first_line.into());
    }

    pub fn push(&self, line: impl Into<String>) {
        let mut lines = self.lock();
        lines.push(line.into());
        if lines.len() > MAX_LOG_LINES {
            let excess = lines.len() - MAX_LOG_LINES;
            lines.drain(..excess);
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shared handler state
pub struct AppState<G, S>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    pub coordinator: Arc<Coordinator<G, S>>,
    pub settings: Arc<RwLock<Settings>>,
    pub settings_path: Arc<PathBuf>,
    pub status_log: Arc<StatusLog>,
    /// Sender handed to every run; drained by the status task
    pub events: mpsc::UnboundedSender<RunEvent>,
}

impl<G, S> Clone for AppState<G, S>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            settings: Arc::clone(&self.settings),
            settings_path: Arc::clone(&self.settings_path),
            status_log: Arc::clone(&self.status_log),
            events: self.events.clone(),
        }
    }
}

impl<G, S> AppState<G, S>
where
    G: ArticleGenerator + 'static,
    S: ArticleStore + 'static,
{
    /// Build the state and the receiving end of the run event channel
    pub fn new(
        coordinator: Coordinator<G, S>,
        settings: Settings,
        settings_path: PathBuf,
    ) -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let state = Self {
            coordinator: Arc::new(coordinator),
            settings: Arc::new(RwLock::new(settings)),
            settings_path: Arc::new(settings_path),
            status_log: Arc::new(StatusLog::new()),
            events,
        };
        (state, events_rx)
    }
}

/// Fold run events into the status log until every sender is gone
pub async fn drain_run_events(status_log: Arc<StatusLog>, mut events: mpsc::UnboundedReceiver<RunEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            RunEvent::Progress { processed, error_count, .. } => {
                tracing::debug!("📈 Run progress: {} processed, {} errors", processed, error_count);
            }
            RunEvent::Completed {
                success_count,
                error_count,
                ..
            } => {
                status_log.push(format!("Batch finished: {} succeeded, {} failed", success_count, error_count));
            }
        }
    }
}
