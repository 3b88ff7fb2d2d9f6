//! Graphite plaintext protocol: `path value timestamp\n` over TCP.

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

use super::{key_prefix, percentile_key, run_periodic, Rates, ReportOptions, Summary};
use crate::error::MetricsResult;
use crate::metrics::Metric;
use crate::registry::Registry;

/// Render every metric in `registry` as Graphite lines stamped `timestamp`
/// (unix seconds).
pub fn format_lines(registry: &Registry, opts: &ReportOptions, timestamp: i64) -> String {
    let prefix = key_prefix(registry);
    let mut out = String::new();

    registry.each(|name, metric| {
        let mut w = Lines {
            out: &mut out,
            prefix: &prefix,
            name,
            timestamp,
        };
        match metric {
            Metric::Counter(c) => w.int("count", c.count()),
            Metric::Gauge(g) => w.int("value", g.value()),
            Metric::Gauge64(g) => w.float("value", g.value()),
            Metric::Histogram(h) => {
                w.int("count", h.count());
                w.summary(&Summary::of(&h.snapshot(), &opts.percentiles));
            }
            Metric::Meter(m) => {
                w.int("count", m.count());
                w.rates(&Rates::of_meter(m), "mean");
            }
            Metric::Timer(t) => {
                w.int("count", t.count());
                w.summary(&Summary::of_durations(
                    &t.snapshot(),
                    &opts.percentiles,
                    opts.duration_unit,
                ));
                w.rates(&Rates::of_timer(t), "mean-rate");
            }
        }
    });

    out
}

struct Lines<'a> {
    out: &'a mut String,
    prefix: &'a str,
    name: &'a str,
    timestamp: i64,
}

impl Lines<'_> {
    fn int(&mut self, field: &str, value: i64) {
        let _ = writeln!(
            self.out,
            "{}{}.{field} {value} {}",
            self.prefix, self.name, self.timestamp
        );
    }

    fn float(&mut self, field: &str, value: f64) {
        let _ = writeln!(
            self.out,
            "{}{}.{field} {value:.2} {}",
            self.prefix, self.name, self.timestamp
        );
    }

    fn summary(&mut self, s: &Summary) {
        self.int("min", s.min);
        self.int("max", s.max);
        self.float("mean", s.mean);
        self.float("std-dev", s.std_dev);
        for (q, v) in &s.percentiles {
            self.float(&format!("{}-percentile", percentile_key(*q)), *v);
        }
    }

    fn rates(&mut self, r: &Rates, mean_field: &str) {
        self.float("one-minute", r.m1);
        self.float("five-minute", r.m5);
        self.float("fifteen-minute", r.m15);
        self.float(mean_field, r.mean);
    }
}

/// Connect to `addr`, send one batch and close the connection.
pub async fn report_once(
    addr: SocketAddr,
    registry: &Registry,
    opts: &ReportOptions,
) -> MetricsResult<()> {
    let payload = format_lines(registry, opts, chrono::Utc::now().timestamp());
    let mut conn = TcpStream::connect(addr).await?;
    conn.write_all(payload.as_bytes()).await?;
    conn.shutdown().await?;
    debug!(%addr, bytes = payload.len(), "flushed to graphite");
    Ok(())
}

/// Flush to `addr` every `interval` until the task is dropped.
pub async fn run(
    addr: SocketAddr,
    registry: Arc<Registry>,
    opts: ReportOptions,
    interval: Duration,
) {
    run_periodic("graphite", interval, || report_once(addr, &registry, &opts)).await
}
