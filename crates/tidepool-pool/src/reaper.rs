//! Periodic reaper for idle cached connections
//!
//! The reaper holds no state of its own; each tick delegates to
//! [`Pool::sweep`](crate::Pool::sweep). Timestamps are wall-clock unix
//! seconds, so a backwards clock step can close some cached entries early.
//! That is a best-effort miss, never a correctness problem: the affected
//! slots simply take the slow path on their next borrow.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::pool::Pool;

/// Handle to the background sweep task
pub(crate) struct Reaper {
    handle: JoinHandle<()>,
}

impl Reaper {
    /// Spawn the sweep loop on the current Tokio runtime.
    pub(crate) fn spawn(pool: Pool, interval: Duration) -> Self {
        tracing::debug!(interval_secs = interval.as_secs(), "starting reaper");
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // An interval's first tick completes immediately; skip it so the
            // first sweep runs one full interval after startup.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                pool.sweep().await;
            }
        });
        Self { handle }
    }

    /// Stop the sweep task
    pub(crate) fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
