//! Exponentially decaying reservoir.
//!
//! Keeps a fixed-size sample of an unbounded stream, biased toward recent
//! values with forward-decay weighting (Cormode et al.). Each update gets the
//! weight `exp(alpha * (t - t0))` and the priority `weight / u` with `u` drawn
//! from `(0, 1]`; the `capacity` highest priorities survive. Weights are
//! renormalised every [`RESCALE_THRESHOLD`] so they stay within `f64` range in
//! long-running processes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::distributions::OpenClosed01;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::sample_store::{Priority, WeightedSample, WeightedSampleStore};
use super::snapshot::Snapshot;

/// Default capacity: gives a 99.9% confidence level with a 5% margin of error
/// assuming a normal distribution.
pub const DEFAULT_RESERVOIR_SIZE: usize = 1028;

/// Default decay factor (per second). Heavily biases toward the last 5 minutes.
pub const DEFAULT_ALPHA: f64 = 0.015;

/// How often stored weights are renormalised.
pub const RESCALE_THRESHOLD: Duration = Duration::from_secs(60 * 60);

pub struct ExpDecayReservoir {
    alpha: f64,
    capacity: usize,
    /// Every value ever offered, retained or not.
    count: AtomicU64,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

/// Everything the check-then-act update sequence touches. One lock covers
/// rescale and insert/evict so neither can observe the other half-done.
struct State {
    values: WeightedSampleStore,
    /// Landmark the weights are measured from.
    t0: Instant,
    /// Next rescale deadline.
    t1: Instant,
    rng: StdRng,
}

impl ExpDecayReservoir {
    /// A reservoir holding at most `capacity` samples (minimum 1) with decay
    /// rate `alpha`. `alpha == 0.0` degenerates to uniform sampling; a
    /// negative or non-finite `alpha` is treated as `0.0`.
    pub fn new(capacity: usize, alpha: f64) -> Self {
        let alpha = if alpha.is_finite() && alpha >= 0.0 {
            alpha
        } else {
            warn!(alpha, "invalid decay rate, falling back to uniform sampling");
            0.0
        };
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let t0 = clock.now();
        Self {
            alpha,
            capacity: capacity.max(1),
            count: AtomicU64::new(0),
            clock,
            state: Mutex::new(State {
                values: WeightedSampleStore::new(),
                t0,
                t1: deadline_after(t0),
                rng: StdRng::from_entropy(),
            }),
        }
    }

    /// Use `clock` for `update()` and re-anchor the decay landmark on it.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        let t0 = clock.now();
        let state = self.state.get_mut();
        state.t0 = t0;
        state.t1 = deadline_after(t0);
        self.clock = clock;
        self
    }

    /// Seed the priority draws, making sampling reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.state.get_mut().rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of values offered so far.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// `min(count, capacity)`.
    pub fn size(&self) -> usize {
        usize::try_from(self.count()).map_or(self.capacity, |n| n.min(self.capacity))
    }

    /// Offer `value` at the clock's current time.
    pub fn update(&self, value: i64) {
        self.update_at(value, self.clock.now());
    }

    /// Offer `value` as observed at `timestamp`.
    pub fn update_at(&self, value: i64, timestamp: Instant) {
        let mut state = self.state.lock();

        if timestamp > state.t1 {
            state.rescale(timestamp, self.alpha);
        }
        self.count.fetch_add(1, Ordering::Relaxed);

        let mut weight = state.weight(timestamp, self.alpha);
        if !weight.is_finite() {
            warn!(alpha = self.alpha, "decay weight overflowed, rescaling early");
            state.rescale(timestamp, self.alpha);
            weight = state.weight(timestamp, self.alpha);
        }

        let u: f64 = state.rng.sample(OpenClosed01);
        let priority = (weight / u).min(f64::MAX);
        let tiebreak = state.rng.gen::<u64>();
        let Some(key) = Priority::new(priority, tiebreak) else {
            warn!(weight, u, "discarding sample with NaN priority");
            return;
        };
        let sample = WeightedSample { weight, value };

        if state.values.len() < self.capacity {
            state.values.insert(key, sample);
            return;
        }

        if let Some((min, _)) = state.values.find_min() {
            if min.value() < priority && state.values.insert(key, sample) {
                state.values.delete(&min);
            }
        }
    }

    /// Copy out the retained values. Sorting happens after the lock is
    /// released.
    pub fn snapshot(&self) -> Snapshot {
        let values: Vec<i64> = {
            let state = self.state.lock();
            state.values.iter().map(|(_, s)| s.value).collect()
        };
        Snapshot::new(values)
    }

    /// Drop every sample and restart the decay landmark.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.values.clear();
        let t0 = self.clock.now();
        state.t0 = t0;
        state.t1 = deadline_after(t0);
        self.count.store(0, Ordering::Relaxed);
    }
}

impl Default for ExpDecayReservoir {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVOIR_SIZE, DEFAULT_ALPHA)
    }
}

impl std::fmt::Debug for ExpDecayReservoir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpDecayReservoir")
            .field("alpha", &self.alpha)
            .field("capacity", &self.capacity)
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}

impl State {
    fn weight(&self, timestamp: Instant, alpha: f64) -> f64 {
        let elapsed = timestamp.saturating_duration_since(self.t0).as_secs_f64();
        (alpha * elapsed).exp()
    }

    /// Move the landmark to `now` and shrink every stored weight and priority
    /// by the same factor. The retained values are untouched.
    fn rescale(&mut self, now: Instant, alpha: f64) {
        let old_t0 = self.t0;
        self.t0 = now;
        self.t1 = deadline_after(now);

        let shift = now.saturating_duration_since(old_t0).as_secs_f64();
        let factor = (-alpha * shift).exp();
        self.values.rescale(factor);

        debug!(shift_secs = shift, factor, retained = self.values.len(), "reservoir rescaled");
    }
}

fn deadline_after(t: Instant) -> Instant {
    t.checked_add(RESCALE_THRESHOLD).unwrap_or(t)
}
