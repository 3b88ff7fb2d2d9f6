//! Throughput meter: a monotonic event count plus 1, 5 and 15 minute moving
//! average rates.
//!
//! There is no background ticker. Every `mark` and rate read first calls
//! `tick_if_necessary`, which advances the averages by however many whole
//! tick intervals have passed. The `last_tick` compare-and-swap elects exactly
//! one caller to apply the ticks for a given interval; everyone else carries
//! on without blocking.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::clock::{Clock, SystemClock};
use super::ewma::{Ewma, TICK_INTERVAL};

#[derive(Debug)]
pub struct Meter {
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
    count: AtomicI64,
    start: Instant,
    /// Nanoseconds from `start` to the last applied tick boundary.
    last_tick: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl Meter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            m1: Ewma::one_minute(),
            m5: Ewma::five_minutes(),
            m15: Ewma::fifteen_minutes(),
            count: AtomicI64::new(0),
            start: clock.now(),
            last_tick: AtomicU64::new(0),
            clock,
        }
    }

    /// Record `n` events.
    pub fn mark(&self, n: i64) {
        self.tick_if_necessary();
        self.count.fetch_add(n, Ordering::Relaxed);
        self.m1.update(n);
        self.m5.update(n);
        self.m15.update(n);
    }

    pub fn mark_one(&self) {
        self.mark(1);
    }

    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn rate1(&self) -> f64 {
        self.tick_if_necessary();
        self.m1.rate()
    }

    pub fn rate5(&self) -> f64 {
        self.tick_if_necessary();
        self.m5.rate()
    }

    pub fn rate15(&self) -> f64 {
        self.tick_if_necessary();
        self.m15.rate()
    }

    /// Events per second since the meter was created.
    pub fn rate_mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        count as f64 / elapsed
    }

    fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.start)
    }

    fn tick_if_necessary(&self) {
        let interval = TICK_INTERVAL.as_nanos() as u64;
        let old = self.last_tick.load(Ordering::Acquire);
        let now = u64::try_from(self.elapsed().as_nanos()).unwrap_or(u64::MAX);
        let age = now.saturating_sub(old);
        if age <= interval {
            return;
        }

        let new_tick = now - age % interval;
        if self
            .last_tick
            .compare_exchange(old, new_tick, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            let required = age / interval;
            for _ in 0..required {
                self.m1.tick();
                self.m5.tick();
                self.m15.tick();
            }
        }
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::clock::ManualClock;

    fn manual() -> (Meter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (Meter::with_clock(clock.clone()), clock)
    }

    #[test]
    fn starts_out_with_no_rates_or_count() {
        let (meter, _) = manual();
        assert_eq!(meter.count(), 0);
        assert_eq!(meter.rate_mean(), 0.0);
        assert_eq!(meter.rate1(), 0.0);
        assert_eq!(meter.rate5(), 0.0);
        assert_eq!(meter.rate15(), 0.0);
    }

    #[test]
    fn marks_events_and_updates_rates() {
        let (meter, clock) = manual();
        meter.mark(1);
        meter.mark(2);
        clock.advance(Duration::from_secs(10));

        assert_eq!(meter.count(), 3);
        assert!((meter.rate_mean() - 0.3).abs() < 1e-9);
        // Two ticks: first folds 3 events over 5s, second folds nothing.
        let alpha = meter.m1.alpha();
        let expected = 0.6 * (1.0 - alpha);
        assert!((meter.rate1() - expected).abs() < 1e-9);
    }

    #[test]
    fn one_event_per_second_for_a_minute() {
        let (meter, clock) = manual();
        for _ in 0..60 {
            clock.advance(Duration::from_secs(1));
            meter.mark(1);
        }

        assert_eq!(meter.count(), 60);
        assert!((meter.rate_mean() - 1.0).abs() < 1e-9);
        // Ticks lag by at most one interval, so the 1-minute rate has
        // started moving toward 1/s but is not there yet.
        let r1 = meter.rate1();
        assert!(r1 > 0.0 && r1 <= 1.0, "rate1 {r1}");
    }

    #[test]
    fn no_tick_within_an_interval() {
        let (meter, clock) = manual();
        meter.mark(10);
        clock.advance(TICK_INTERVAL);
        // age == interval is not enough to tick
        assert_eq!(meter.rate1(), 0.0);
        clock.advance(Duration::from_millis(1));
        assert!(meter.rate1() > 0.0);
    }

    #[test]
    fn long_idle_applies_every_missed_tick_once() {
        let (meter, clock) = manual();
        meter.mark(3);
        clock.advance(Duration::from_secs(65));
        let rate = meter.rate1();

        // 13 ticks: 0.6 after the first, decayed by 12 more.
        let expected = 0.6 * (1.0 - meter.m1.alpha()).powi(12);
        assert!((rate - expected).abs() < 1e-9);

        // Reading again in the same interval must not tick again.
        assert_eq!(meter.rate1(), rate);
        assert_eq!(meter.last_tick.load(Ordering::Relaxed), 65_000_000_000);
    }

    #[test]
    fn concurrent_marks_sum_exactly() {
        let (meter, clock) = manual();
        std::thread::scope(|scope| {
            for t in 0..8i64 {
                let meter = &meter;
                let clock = &clock;
                scope.spawn(move || {
                    for i in 0..1_000i64 {
                        if i % 100 == 0 {
                            clock.advance(Duration::from_secs(1));
                        }
                        meter.mark(t + 1);
                        let _ = meter.rate1();
                    }
                });
            }
        });

        // Sum over t of (t + 1) * 1000
        assert_eq!(meter.count(), 36_000);
    }

    #[test]
    fn system_clock_meter_counts() {
        let meter = Meter::new();
        meter.mark_one();
        meter.mark(4);
        assert_eq!(meter.count(), 5);
        assert!(meter.rate_mean() > 0.0);
    }
}
