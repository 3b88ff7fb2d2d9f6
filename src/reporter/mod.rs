//! Exporters. Each one walks a [`Registry`] with `each`, matches on the
//! metric kind, and formats the fields for its destination. None of them hold
//! state of their own besides their configuration.

pub mod graphite;
pub mod http;
pub mod json;
pub mod log;
pub mod opentsdb;
#[cfg(unix)]
pub mod syslog;
pub mod text;

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::warn;

use crate::config::{DurationUnit, ReportingConfig};
use crate::error::{MetricsError, MetricsResult};
use crate::metrics::{Meter, Snapshot, Timer, DEFAULT_PERCENTILES};
use crate::registry::Registry;

// ─── Options ─────────────────────────────────────────────────────

/// Formatting options shared by every exporter.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Unit timer durations are converted to.
    pub duration_unit: DurationUnit,
    /// Quantiles reported for histograms and timers.
    pub percentiles: Vec<f64>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            duration_unit: DurationUnit::default(),
            percentiles: DEFAULT_PERCENTILES.to_vec(),
        }
    }
}

impl ReportOptions {
    /// Options reporting `percentiles`, each of which must lie in `[0, 1]`.
    pub fn new(duration_unit: DurationUnit, percentiles: Vec<f64>) -> MetricsResult<Self> {
        if let Some(q) = percentiles.iter().find(|q| !(0.0..=1.0).contains(*q)) {
            return Err(MetricsError::InvalidQuantile(*q));
        }
        Ok(Self {
            duration_unit,
            percentiles,
        })
    }
}

impl From<&ReportingConfig> for ReportOptions {
    fn from(config: &ReportingConfig) -> Self {
        Self {
            duration_unit: config.duration_unit,
            percentiles: config.percentiles.clone(),
        }
    }
}

// ─── Shared field extraction ─────────────────────────────────────

/// Distribution statistics of one snapshot, divided by a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub min: i64,
    pub max: i64,
    pub mean: f64,
    pub std_dev: f64,
    /// `(quantile, value)` for each requested quantile.
    pub percentiles: Vec<(f64, f64)>,
}

impl Summary {
    /// Histogram values are reported as recorded.
    pub fn of(snapshot: &Snapshot, quantiles: &[f64]) -> Self {
        Self::scaled(snapshot, quantiles, 1)
    }

    /// Timer values are nanoseconds; report them in `unit`.
    pub fn of_durations(snapshot: &Snapshot, quantiles: &[f64], unit: DurationUnit) -> Self {
        Self::scaled(snapshot, quantiles, unit.nanos())
    }

    fn scaled(snapshot: &Snapshot, quantiles: &[f64], divisor: i64) -> Self {
        let du = divisor as f64;
        let percentiles = quantiles
            .iter()
            .filter_map(|q| match snapshot.value(*q) {
                Ok(v) => Some((*q, v / du)),
                Err(e) => {
                    warn!(error = %e, "skipping invalid percentile");
                    None
                }
            })
            .collect();
        Self {
            min: snapshot.min() / divisor,
            max: snapshot.max() / divisor,
            mean: snapshot.mean() / du,
            std_dev: snapshot.std_dev() / du,
            percentiles,
        }
    }
}

/// The four moving rates of a meter or timer, in events per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rates {
    pub m1: f64,
    pub m5: f64,
    pub m15: f64,
    pub mean: f64,
}

impl Rates {
    pub fn of_meter(meter: &Meter) -> Self {
        Self {
            m1: meter.rate1(),
            m5: meter.rate5(),
            m15: meter.rate15(),
            mean: meter.rate_mean(),
        }
    }

    pub fn of_timer(timer: &Timer) -> Self {
        Self {
            m1: timer.rate1(),
            m5: timer.rate5(),
            m15: timer.rate15(),
            mean: timer.rate_mean(),
        }
    }
}

/// `0.999` → `"999"`, `0.5` → `"50"`: the quantile as a percentage with the
/// decimal point dropped.
pub fn percentile_key(quantile: f64) -> String {
    percentile_label(quantile).replacen('.', "", 1)
}

/// `0.999` → `"99.9"`.
pub fn percentile_label(quantile: f64) -> String {
    let pct = (quantile * 100.0 * 1e6).round() / 1e6;
    format!("{pct}")
}

/// `"prefix."` for a prefixed registry, otherwise empty.
pub fn key_prefix(registry: &Registry) -> String {
    registry
        .prefix()
        .map(|p| format!("{p}."))
        .unwrap_or_default()
}

// ─── Periodic driver ─────────────────────────────────────────────

/// Call `report` every `interval`, forever. Failures are logged and retried
/// on the next tick; they never end the loop.
pub async fn run_periodic<F, Fut>(name: &'static str, interval: Duration, mut report: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = MetricsResult<()>>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; start reporting one interval in.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if let Err(e) = report().await {
            warn!(reporter = name, error = %e, "report failed, retrying next interval");
        }
    }
}
