//! Exponentially weighted moving average of an event rate.
//!
//! Writers only ever touch the `uncounted` accumulator. Folding it into the
//! smoothed rate happens in [`Ewma::tick`], which the owning meter drives once
//! per tick interval.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// Period between ticks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

const NANOS_PER_SEC: f64 = 1e9;

#[derive(Debug)]
pub struct Ewma {
    alpha: f64,
    interval_nanos: f64,
    uncounted: AtomicI64,
    /// Smoothed rate in events per nanosecond, stored as `f64` bits.
    rate: AtomicU64,
    initialized: AtomicBool,
}

impl Ewma {
    pub fn new(alpha: f64, interval: Duration) -> Self {
        Self {
            alpha,
            interval_nanos: interval.as_nanos() as f64,
            uncounted: AtomicI64::new(0),
            rate: AtomicU64::new(0f64.to_bits()),
            initialized: AtomicBool::new(false),
        }
    }

    /// An average over `window`, ticked every `interval`:
    /// `alpha = 1 - exp(-interval / window)`.
    pub fn with_window(window: Duration, interval: Duration) -> Self {
        let alpha = 1.0 - (-interval.as_secs_f64() / window.as_secs_f64()).exp();
        Self::new(alpha, interval)
    }

    pub fn one_minute() -> Self {
        Self::with_window(Duration::from_secs(60), TICK_INTERVAL)
    }

    pub fn five_minutes() -> Self {
        Self::with_window(Duration::from_secs(5 * 60), TICK_INTERVAL)
    }

    pub fn fifteen_minutes() -> Self {
        Self::with_window(Duration::from_secs(15 * 60), TICK_INTERVAL)
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Record `n` new events.
    pub fn update(&self, n: i64) {
        self.uncounted.fetch_add(n, Ordering::Relaxed);
    }

    /// Fold events seen since the last tick into the smoothed rate.
    pub fn tick(&self) {
        let count = self.uncounted.swap(0, Ordering::AcqRel);
        let instant_rate = count as f64 / self.interval_nanos;

        if !self.initialized.swap(true, Ordering::AcqRel) {
            self.rate.store(instant_rate.to_bits(), Ordering::Release);
            return;
        }

        let mut current = self.rate.load(Ordering::Acquire);
        loop {
            let rate = f64::from_bits(current);
            let next = rate + self.alpha * (instant_rate - rate);
            match self.rate.compare_exchange_weak(
                current,
                next.to_bits(),
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// Smoothed rate in events per second. Zero before the first tick.
    pub fn rate(&self) -> f64 {
        self.rate_per(Duration::from_secs(1))
    }

    /// Smoothed rate in events per `unit`.
    pub fn rate_per(&self, unit: Duration) -> f64 {
        f64::from_bits(self.rate.load(Ordering::Acquire)) * unit.as_nanos() as f64
    }
}
