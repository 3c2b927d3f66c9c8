//! Pool tuning configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest supported sweep interval, in seconds
const MIN_REAP_INTERVAL_SECS: u64 = 5;
/// Largest supported sweep interval, in seconds
const MAX_REAP_INTERVAL_SECS: u64 = 15;

/// Tuning knobs for the idle-connection reaper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Seconds between reaper sweeps
    reap_interval_secs: u64,
    /// Seconds a database's cache may sit untouched before a sweep drains it
    idle_grace_secs: u64,
}

impl PoolConfig {
    /// Create a configuration. The sweep interval is clamped into the
    /// supported 5..=15 second window.
    pub fn new(reap_interval_secs: u64, idle_grace_secs: u64) -> Self {
        Self {
            reap_interval_secs: reap_interval_secs
                .clamp(MIN_REAP_INTERVAL_SECS, MAX_REAP_INTERVAL_SECS),
            idle_grace_secs,
        }
    }

    /// Set the sweep interval in seconds (clamped to 5..=15)
    pub fn with_reap_interval_secs(mut self, secs: u64) -> Self {
        self.reap_interval_secs = secs.clamp(MIN_REAP_INTERVAL_SECS, MAX_REAP_INTERVAL_SECS);
        self
    }

    /// Set the idle grace period in seconds
    pub fn with_idle_grace_secs(mut self, secs: u64) -> Self {
        self.idle_grace_secs = secs;
        self
    }

    /// Interval between reaper sweeps
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }

    /// How long a database's cache may sit untouched before it is drained
    pub fn idle_grace(&self) -> Duration {
        Duration::from_secs(self.idle_grace_secs)
    }
}

impl Default for PoolConfig {
    /// 10 second sweeps, 30 second idle grace
    fn default() -> Self {
        Self {
            reap_interval_secs: 10,
            idle_grace_secs: 30,
        }
    }
}
