//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Counts for one database's slot stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Closed slots eligible for the slow path
    available: usize,
    /// Open idle slots eligible for fast reuse
    cached: usize,
    /// Slots currently borrowed by workers
    in_use: usize,
}

impl PoolStats {
    pub(crate) fn new(available: usize, cached: usize, in_use: usize) -> Self {
        Self {
            available,
            cached,
            in_use,
        }
    }

    /// Closed slots waiting to be opened
    pub fn available(&self) -> usize {
        self.available
    }

    /// Open idle slots
    pub fn cached(&self) -> usize {
        self.cached
    }

    /// Slots borrowed by workers
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Total registered slots for the database
    pub fn total(&self) -> usize {
        self.available + self.cached + self.in_use
    }

    /// Fraction of registered slots currently borrowed (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.in_use as f64 / total as f64
        }
    }
}
