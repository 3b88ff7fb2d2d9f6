//! Structured log exporter: one `tracing` event per metric.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::{key_prefix, run_periodic, Rates, ReportOptions, Summary};
use crate::metrics::Metric;
use crate::registry::Registry;

pub const TARGET: &str = "decay_metrics::report";

/// Emit every metric once at `INFO` under the [`TARGET`] target.
pub fn log_once(registry: &Registry, opts: &ReportOptions) {
    let prefix = key_prefix(registry);
    registry.each(|name, metric| {
        let name = format!("{prefix}{name}");
        match metric {
            Metric::Counter(c) => info!(target: TARGET, metric = %name, count = c.count(), "counter"),
            Metric::Gauge(g) => info!(target: TARGET, metric = %name, value = g.value(), "gauge"),
            Metric::Gauge64(g) => info!(target: TARGET, metric = %name, value = g.value(), "gauge64"),
            Metric::Histogram(h) => {
                let s = Summary::of(&h.snapshot(), &opts.percentiles);
                info!(
                    target: TARGET,
                    metric = %name,
                    count = h.count(),
                    min = s.min,
                    max = s.max,
                    mean = s.mean,
                    stddev = s.std_dev,
                    percentiles = ?s.percentiles,
                    "histogram"
                );
            }
            Metric::Meter(m) => {
                let r = Rates::of_meter(m);
                info!(
                    target: TARGET,
                    metric = %name,
                    count = m.count(),
                    m1 = r.m1,
                    m5 = r.m5,
                    m15 = r.m15,
                    mean_rate = r.mean,
                    "meter"
                );
            }
            Metric::Timer(t) => {
                let s = Summary::of_durations(&t.snapshot(), &opts.percentiles, opts.duration_unit);
                let r = Rates::of_timer(t);
                info!(
                    target: TARGET,
                    metric = %name,
                    unit = opts.duration_unit.suffix(),
                    count = t.count(),
                    min = s.min,
                    max = s.max,
                    mean = s.mean,
                    stddev = s.std_dev,
                    percentiles = ?s.percentiles,
                    m1 = r.m1,
                    m5 = r.m5,
                    m15 = r.m15,
                    mean_rate = r.mean,
                    "timer"
                );
            }
        }
    });
}

pub async fn run(registry: Arc<Registry>, opts: ReportOptions, interval: Duration) {
    run_periodic("log", interval, || {
        log_once(&registry, &opts);
        std::future::ready(Ok(()))
    })
    .await
}
