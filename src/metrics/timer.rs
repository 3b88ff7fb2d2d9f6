//! Timer: a histogram of durations plus a meter of how often they occur.
//!
//! Durations are recorded in nanoseconds. Scoped timing goes through a
//! [`TimerContext`] guard that records on drop, so work that panics, returns
//! early or (for futures) gets cancelled is still timed.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::clock::{Clock, SystemClock};
use super::histogram::Histogram;
use super::meter::Meter;
use super::reservoir::ExpDecayReservoir;
use super::snapshot::Snapshot;

#[derive(Debug)]
pub struct Timer {
    histogram: Histogram,
    meter: Meter,
    clock: Arc<dyn Clock>,
}

impl Timer {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Timer whose meter, reservoir and scoped measurements all read `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let reservoir = ExpDecayReservoir::default().with_clock(clock.clone());
        Self {
            histogram: Histogram::with_reservoir(reservoir),
            meter: Meter::with_clock(clock.clone()),
            clock,
        }
    }

    /// Compose a timer from a caller-built histogram and meter.
    pub fn with_parts(histogram: Histogram, meter: Meter) -> Self {
        Self {
            histogram,
            meter,
            clock: Arc::new(SystemClock),
        }
    }

    /// Record one call that took `duration`.
    pub fn update(&self, duration: Duration) {
        let nanos = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);
        self.histogram.update(nanos);
        self.meter.mark(1);
    }

    /// Record one call that started at `start` and ends now.
    pub fn update_since(&self, start: Instant) {
        self.update(self.clock.now().saturating_duration_since(start));
    }

    /// Start timing; the returned guard records when stopped or dropped.
    pub fn start(&self) -> TimerContext<'_> {
        TimerContext {
            timer: self,
            start: self.clock.now(),
            stopped: false,
        }
    }

    /// Run `f` and record how long it took, even if it panics.
    pub fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _ctx = self.start();
        f()
    }

    /// Await `fut` and record how long it took. Timing starts when this is
    /// called, not on first poll, so a future dropped before completion (even
    /// one never polled) is recorded up to the point it was dropped.
    pub fn time_async<'a, F>(&'a self, fut: F) -> impl Future<Output = F::Output> + 'a
    where
        F: Future + 'a,
    {
        let ctx = self.start();
        async move {
            let _ctx = ctx;
            fut.await
        }
    }

    pub fn count(&self) -> i64 {
        self.histogram.count()
    }

    pub fn rate1(&self) -> f64 {
        self.meter.rate1()
    }

    pub fn rate5(&self) -> f64 {
        self.meter.rate5()
    }

    pub fn rate15(&self) -> f64 {
        self.meter.rate15()
    }

    pub fn rate_mean(&self) -> f64 {
        self.meter.rate_mean()
    }

    /// Snapshot of recorded durations, in nanoseconds.
    pub fn snapshot(&self) -> Snapshot {
        self.histogram.snapshot()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// In-flight measurement started by [`Timer::start`].
#[must_use = "dropping the context immediately records a zero-length call"]
pub struct TimerContext<'a> {
    timer: &'a Timer,
    start: Instant,
    stopped: bool,
}

impl TimerContext<'_> {
    /// Record the elapsed time now and return it.
    pub fn stop(mut self) -> Duration {
        self.record()
    }

    fn record(&mut self) -> Duration {
        self.stopped = true;
        let elapsed = self.timer.clock.now().saturating_duration_since(self.start);
        self.timer.update(elapsed);
        elapsed
    }
}

impl Drop for TimerContext<'_> {
    fn drop(&mut self) {
        if !self.stopped {
            self.record();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::clock::ManualClock;

    fn manual() -> (Timer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (Timer::with_clock(clock.clone()), clock)
    }

    #[test]
    fn update_feeds_histogram_and_meter() {
        let (timer, _) = manual();
        timer.update(Duration::from_millis(10));
        timer.update(Duration::from_millis(20));

        assert_eq!(timer.count(), 2);
        let s = timer.snapshot();
        assert_eq!(s.min(), 10_000_000);
        assert_eq!(s.max(), 20_000_000);
    }

    #[test]
    fn time_records_the_closure_duration() {
        let (timer, clock) = manual();
        let out = timer.time(|| {
            clock.advance(Duration::from_millis(50));
            "done"
        });

        assert_eq!(out, "done");
        assert_eq!(timer.count(), 1);
        assert_eq!(timer.snapshot().max(), 50_000_000);
    }

    #[test]
    fn time_records_even_when_the_work_panics() {
        let (timer, clock) = manual();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            timer.time(|| {
                clock.advance(Duration::from_millis(5));
                panic!("boom");
            })
        }));

        assert!(result.is_err());
        assert_eq!(timer.count(), 1);
        assert_eq!(timer.snapshot().max(), 5_000_000);
    }

    #[test]
    fn context_stop_records_once() {
        let (timer, clock) = manual();
        let ctx = timer.start();
        clock.advance(Duration::from_secs(1));
        assert_eq!(ctx.stop(), Duration::from_secs(1));
        assert_eq!(timer.count(), 1);
    }

    #[test]
    fn update_since_measures_from_start() {
        let (timer, clock) = manual();
        let start = clock.now();
        clock.advance(Duration::from_micros(750));
        timer.update_since(start);
        assert_eq!(timer.snapshot().max(), 750_000);
    }

    #[tokio::test]
    async fn time_async_records_completed_futures() {
        let (timer, clock) = manual();
        let value = timer
            .time_async(async {
                clock.advance(Duration::from_millis(3));
                7
            })
            .await;

        assert_eq!(value, 7);
        assert_eq!(timer.count(), 1);
        assert_eq!(timer.snapshot().max(), 3_000_000);
    }

    #[tokio::test]
    async fn time_async_records_cancelled_futures() {
        let timer = Timer::new();
        let slow = timer.time_async(tokio::time::sleep(Duration::from_secs(60)));
        let _ = tokio::time::timeout(Duration::from_millis(10), slow).await;
        assert_eq!(timer.count(), 1);
    }

    #[test]
    fn time_async_starts_before_first_poll() {
        let (timer, clock) = manual();
        let pending = timer.time_async(std::future::pending::<()>());
        clock.advance(Duration::from_millis(5));
        drop(pending);

        assert_eq!(timer.count(), 1);
        assert_eq!(timer.snapshot().max(), 5_000_000);
    }

    #[test]
    fn rates_follow_the_meter() {
        let (timer, clock) = manual();
        for _ in 0..10 {
            timer.update(Duration::from_millis(1));
        }
        clock.advance(Duration::from_secs(10));
        assert!((timer.rate_mean() - 1.0).abs() < 1e-9);
        assert!(timer.rate1() > 0.0);
        assert!(timer.rate5() > 0.0);
        assert!(timer.rate15() > 0.0);
    }
}
