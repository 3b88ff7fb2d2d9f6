//! OpenTSDB telnet-style `put` lines over TCP.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

use super::{key_prefix, percentile_key, run_periodic, Rates, ReportOptions, Summary};
use crate::config::OpenTsdbConfig;
use crate::error::MetricsResult;
use crate::metrics::Metric;
use crate::registry::Registry;

/// Host part before the first dot: `web1.example.com` → `web1`.
pub fn short_hostname(host: &str) -> &str {
    match host.find('.') {
        Some(idx) if idx > 0 => &host[..idx],
        _ => host,
    }
}

/// Short hostname from `$HOSTNAME`, or `localhost` when unset.
pub fn default_host() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .map(|h| short_hostname(&h).to_owned())
        .unwrap_or_else(|| "localhost".to_owned())
}

pub fn format_lines(
    registry: &Registry,
    opts: &ReportOptions,
    host: &str,
    timestamp: i64,
) -> String {
    let prefix = key_prefix(registry);
    let mut out = String::new();

    registry.each(|name, metric| {
        let mut put = |field: &str, value: String| {
            let _ = writeln!(out, "put {prefix}{name}.{field} {timestamp} {value} host={host}");
        };
        let summary = |put: &mut dyn FnMut(&str, String), s: Summary| {
            put("min", s.min.to_string());
            put("max", s.max.to_string());
            put("mean", format!("{:.2}", s.mean));
            put("std-dev", format!("{:.2}", s.std_dev));
            for (q, v) in s.percentiles {
                put(&format!("{}-percentile", percentile_key(q)), format!("{v:.2}"));
            }
        };
        let rates = |put: &mut dyn FnMut(&str, String), r: Rates, mean_field: &str| {
            put("one-minute", format!("{:.2}", r.m1));
            put("five-minute", format!("{:.2}", r.m5));
            put("fifteen-minute", format!("{:.2}", r.m15));
            put(mean_field, format!("{:.2}", r.mean));
        };

        match metric {
            Metric::Counter(c) => put("count", c.count().to_string()),
            Metric::Gauge(g) => put("value", g.value().to_string()),
            Metric::Gauge64(g) => put("value", format!("{:.6}", g.value())),
            Metric::Histogram(h) => {
                put("count", h.count().to_string());
                summary(&mut put, Summary::of(&h.snapshot(), &opts.percentiles));
            }
            Metric::Meter(m) => {
                put("count", m.count().to_string());
                rates(&mut put, Rates::of_meter(m), "mean");
            }
            Metric::Timer(t) => {
                put("count", t.count().to_string());
                summary(
                    &mut put,
                    Summary::of_durations(&t.snapshot(), &opts.percentiles, opts.duration_unit),
                );
                rates(&mut put, Rates::of_timer(t), "mean-rate");
            }
        }
    });

    out
}

pub async fn report_once(
    config: &OpenTsdbConfig,
    registry: &Registry,
    opts: &ReportOptions,
) -> MetricsResult<()> {
    let host = config.host.clone().unwrap_or_else(default_host);
    let payload = format_lines(registry, opts, &host, chrono::Utc::now().timestamp());
    let mut conn = TcpStream::connect(config.addr).await?;
    conn.write_all(payload.as_bytes()).await?;
    conn.shutdown().await?;
    debug!(addr = %config.addr, bytes = payload.len(), "flushed to opentsdb");
    Ok(())
}

pub async fn run(
    config: OpenTsdbConfig,
    registry: Arc<Registry>,
    opts: ReportOptions,
    interval: Duration,
) {
    run_periodic("opentsdb", interval, || report_once(&config, &registry, &opts)).await
}
