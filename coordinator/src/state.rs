//! Run state management
//!
//! A `Run` owns its counters and cancellation flag and is shared between the
//! dispatcher (which mutates it) and the tracker (which reports on it).
//!
//! A run completes only once its driver has finished and every spawned unit
//! has resolved, including units detached by a stop.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use shared::{RunEvent, RunId, RunMode, RunRequest, RunSnapshot, RunStatus};

use crate::error::{CoordinatorError, CoordinatorResult};

/// Mutable part of a run, guarded by one lock
#[derive(Debug, Clone, Copy)]
pub struct RunCounters {
    pub status: RunStatus,
    pub processed: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub started_at: Instant,
    pub ended_at: Option<Instant>,
    /// Spawned units that have not resolved yet
    pub in_flight: u64,
    /// The driver stopped submitting and waiting
    pub driver_finished: bool,
}

impl RunCounters {
    fn elapsed_seconds(&self, now: Instant) -> f64 {
        let end = self.ended_at.unwrap_or(now);
        end.saturating_duration_since(self.started_at).as_secs_f64()
    }
}

/// One batch run
#[derive(Debug)]
pub struct Run {
    id: RunId,
    request: RunRequest,
    cancel: watch::Sender<bool>,
    completed: watch::Sender<bool>,
    counters: Mutex<RunCounters>,
}

/// Keeps its run active until dropped at the end of a unit task
#[must_use]
pub struct UnitGuard {
    run: Arc<Run>,
    events: mpsc::UnboundedSender<RunEvent>,
}

impl Drop for UnitGuard {
    fn drop(&mut self) {
        self.run.unit_resolved(&self.events);
    }
}

impl Run {
    pub fn new(request: RunRequest) -> Self {
        let (cancel, _) = watch::channel(false);
        let (completed, _) = watch::channel(false);
        Self {
            id: RunId::new(),
            request,
            cancel,
            completed,
            counters: Mutex::new(RunCounters {
                status: RunStatus::Running,
                processed: 0,
                success_count: 0,
                error_count: 0,
                started_at: Instant::now(),
                ended_at: None,
                in_flight: 0,
                driver_finished: false,
            }),
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn request(&self) -> &RunRequest {
        &self.request
    }

    pub fn mode(&self) -> RunMode {
        self.request.mode
    }

    pub fn status(&self) -> RunStatus {
        self.lock_counters().status
    }

    /// True only while units may still start
    pub fn is_running(&self) -> bool {
        self.status() == RunStatus::Running
    }

    pub fn counters(&self) -> RunCounters {
        *self.lock_counters()
    }

    /// Set the cancellation flag; returns false if the run was not running
    pub fn request_stop(&self) -> bool {
        let stopped = {
            let mut counters = self.lock_counters();
            if counters.status == RunStatus::Running {
                counters.status = RunStatus::Stopping;
                true
            } else {
                false
            }
        };
        self.cancel.send_replace(true);
        stopped
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    pub fn subscribe_cancel(&self) -> watch::Receiver<bool> {
        self.cancel.subscribe()
    }

    /// Count one resolved unit and emit its progress event
    ///
    /// The event is sent while the counter lock is held so events arrive in
    /// counter order.
    pub fn record_outcome(&self, success: bool, rate_remaining: u32, events: &mpsc::UnboundedSender<RunEvent>) -> RunCounters {
        let mut counters = self.lock_counters();
        if success {
            counters.success_count += 1;
        } else {
            counters.error_count += 1;
        }
        counters.processed += 1;

        // The receiver may be gone; counting still matters
        let _ = events.send(RunEvent::Progress {
            run_id: self.id,
            processed: counters.processed,
            total: self.request.mode.total(),
            success_count: counters.success_count,
            error_count: counters.error_count,
            rate_remaining,
        });

        *counters
    }

    /// Count a spawned unit as in flight until the guard drops
    pub fn track_unit(self: &Arc<Self>, events: &mpsc::UnboundedSender<RunEvent>) -> UnitGuard {
        self.lock_counters().in_flight += 1;
        UnitGuard {
            run: Arc::clone(self),
            events: events.clone(),
        }
    }

    fn unit_resolved(&self, events: &mpsc::UnboundedSender<RunEvent>) {
        let mut counters = self.lock_counters();
        counters.in_flight = counters.in_flight.saturating_sub(1);
        self.complete_if_drained(&mut counters, events);
    }

    /// Driver is done; the run completes now or when its last unit resolves
    pub fn finish(&self, events: &mpsc::UnboundedSender<RunEvent>) -> RunCounters {
        let mut counters = self.lock_counters();
        counters.driver_finished = true;
        self.complete_if_drained(&mut counters, events);
        *counters
    }

    /// Wait until the run has completed
    pub async fn wait_completed(&self) {
        let mut completed = self.completed.subscribe();
        // The sender lives as long as `self`
        let _ = completed.wait_for(|done| *done).await;
    }

    fn complete_if_drained(&self, counters: &mut RunCounters, events: &mpsc::UnboundedSender<RunEvent>) {
        if !counters.driver_finished || counters.in_flight > 0 || counters.status == RunStatus::Completed {
            return;
        }
        counters.status = RunStatus::Completed;
        counters.ended_at = Some(Instant::now());
        shared::logging::log_run_summary(&self.id, counters.success_count, counters.error_count);

        if let RunMode::Fixed { count } = self.request.mode {
            let _ = events.send(RunEvent::Completed {
                run_id: self.id,
                total: count,
                success_count: counters.success_count,
                error_count: counters.error_count,
            });
        }
        self.completed.send_replace(true);
    }

    pub fn snapshot(&self, rate_remaining: u32) -> RunSnapshot {
        let counters = self.counters();
        let elapsed_seconds = counters.elapsed_seconds(Instant::now());
        let average_seconds_per_unit = if counters.processed > 0 {
            elapsed_seconds / counters.processed as f64
        } else {
            0.0
        };

        RunSnapshot {
            run_id: Some(self.id),
            seed: self.request.seed.clone(),
            status: counters.status,
            is_running: counters.status.is_active(),
            processed: counters.processed,
            total: self.request.mode.total(),
            success_count: counters.success_count,
            error_count: counters.error_count,
            rate_remaining,
            elapsed_seconds,
            average_seconds_per_unit,
        }
    }

    fn lock_counters(&self) -> MutexGuard<'_, RunCounters> {
        // Counters are plain integers; a panicked holder cannot leave them torn
        self.counters.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Holds the current (or most recent) run and enforces one active run
#[derive(Debug, Default)]
pub struct RunStateTracker {
    current: Mutex<Option<Arc<Run>>>,
}

impl RunStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run unless another one is running or still draining
    pub fn begin(&self, request: RunRequest) -> CoordinatorResult<Arc<Run>> {
        let mut current = self.current.lock().map_err(|_| CoordinatorError::LockPoisoned {
            resource: "run tracker".to_string(),
        })?;

        if current.as_ref().is_some_and(|run| run.status().is_active()) {
            return Err(CoordinatorError::RunInProgress);
        }

        let run = Arc::new(Run::new(request));
        *current = Some(Arc::clone(&run));
        Ok(run)
    }

    pub fn current(&self) -> Option<Arc<Run>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Running or still draining after a stop
    pub fn is_active(&self) -> bool {
        self.current().is_some_and(|run| run.status().is_active())
    }

    /// Request cancellation of the current run
    pub fn stop(&self) -> bool {
        self.current().is_some_and(|run| run.request_stop())
    }

    pub fn snapshot(&self, rate_remaining: u32) -> RunSnapshot {
        match self.current() {
            Some(run) => run.snapshot(rate_remaining),
            None => RunSnapshot {
                rate_remaining,
                ..RunSnapshot::default()
            },
        }
    }
}
