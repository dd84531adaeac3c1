//! Sliding-window rate limiting

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Length of the rolling window
pub const WINDOW: Duration = Duration::from_secs(60);

/// Extra wait added after the oldest grant leaves the window
pub const WAIT_EPSILON: Duration = Duration::from_millis(100);

/// Allows at most `max_per_minute` grants inside any trailing 60s window
#[derive(Debug)]
pub struct RateLimiter {
    max_per_minute: usize,
    /// Grant times, oldest first
    window: Mutex<VecDeque<Instant>>,
    /// Serializes acquirers; tokio's mutex hands out the lock in FIFO order
    admission: tokio::sync::Mutex<()>,
}

impl RateLimiter {
    pub fn new(max_per_minute: u32) -> Self {
        let max_per_minute = max_per_minute.max(1) as usize;
        Self {
            max_per_minute,
            window: Mutex::new(VecDeque::with_capacity(max_per_minute)),
            admission: tokio::sync::Mutex::new(()),
        }
    }

    pub fn max_per_minute(&self) -> u32 {
        self.max_per_minute as u32
    }

    /// Wait until one more grant fits in the window, then record it
    pub async fn acquire(&self) {
        let _admitted = self.admission.lock().await;

        loop {
            let wait = {
                let mut window = self.lock_window();
                let now = Instant::now();
                prune(&mut window, now);

                if window.len() < self.max_per_minute {
                    window.push_back(now);
                    return;
                }

                // Full: the front entry is the next to expire
                match window.front() {
                    Some(oldest) => (*oldest + WINDOW).saturating_duration_since(now) + WAIT_EPSILON,
                    None => WAIT_EPSILON,
                }
            };

            tracing::debug!("Rate window full, waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Grants still available right now; advisory only
    pub fn remaining_capacity(&self) -> u32 {
        let mut window = self.lock_window();
        prune(&mut window, Instant::now());
        self.max_per_minute.saturating_sub(window.len()) as u32
    }

    fn lock_window(&self) -> std::sync::MutexGuard<'_, VecDeque<Instant>> {
        // A poisoned window still holds valid timestamps
        self.window.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn prune(window: &mut VecDeque<Instant>, now: Instant) {
    while let Some(oldest) = window.front() {
        if now.saturating_duration_since(*oldest) >= WINDOW {
            window.pop_front();
        } else {
            break;
        }
    }
}
