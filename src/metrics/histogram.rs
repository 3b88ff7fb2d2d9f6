use std::sync::atomic::{AtomicI64, Ordering};

use super::reservoir::ExpDecayReservoir;
use super::snapshot::Snapshot;

/// Distribution of a stream of values, sampled through an exponentially
/// decaying reservoir.
#[derive(Debug)]
pub struct Histogram {
    count: AtomicI64,
    reservoir: ExpDecayReservoir,
}

impl Histogram {
    /// Histogram over a default-sized, default-alpha reservoir.
    pub fn new() -> Self {
        Self::with_reservoir(ExpDecayReservoir::default())
    }

    pub fn with_reservoir(reservoir: ExpDecayReservoir) -> Self {
        Self {
            count: AtomicI64::new(0),
            reservoir,
        }
    }

    pub fn update(&self, value: i64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.reservoir.update(value);
    }

    /// Number of values recorded, including those the reservoir dropped.
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.reservoir.snapshot()
    }

    pub fn reservoir(&self) -> &ExpDecayReservoir {
        &self.reservoir
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}
