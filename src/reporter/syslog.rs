//! Local syslog over a Unix datagram socket, one message per metric.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UnixDatagram;
use tracing::debug;

use super::{key_prefix, percentile_label, run_periodic, Rates, ReportOptions, Summary};
use crate::config::SyslogConfig;
use crate::error::MetricsResult;
use crate::metrics::Metric;
use crate::registry::Registry;

/// facility `user` (1), severity `info` (6).
const PRIORITY: u8 = 14;
const TAG: &str = "decay-metrics";

/// One message body per metric, e.g. `counter jobs: count: 3`.
pub fn format_messages(registry: &Registry, opts: &ReportOptions) -> Vec<String> {
    let prefix = key_prefix(registry);
    let mut messages = Vec::with_capacity(registry.len());

    registry.each(|name, metric| {
        let mut msg = format!("{} {prefix}{name}:", kind_label(metric));
        match metric {
            Metric::Counter(c) => {
                let _ = write!(msg, " count: {}", c.count());
            }
            Metric::Gauge(g) => {
                let _ = write!(msg, " value: {}", g.value());
            }
            Metric::Gauge64(g) => {
                let _ = write!(msg, " value: {:.6}", g.value());
            }
            Metric::Histogram(h) => {
                let _ = write!(msg, " count: {}", h.count());
                push_summary(&mut msg, &Summary::of(&h.snapshot(), &opts.percentiles));
            }
            Metric::Meter(m) => {
                let _ = write!(msg, " count: {}", m.count());
                push_rates(&mut msg, &Rates::of_meter(m), "mean");
            }
            Metric::Timer(t) => {
                let _ = write!(msg, " count: {}", t.count());
                push_summary(
                    &mut msg,
                    &Summary::of_durations(&t.snapshot(), &opts.percentiles, opts.duration_unit),
                );
                push_rates(&mut msg, &Rates::of_timer(t), "mean-rate");
            }
        }
        messages.push(msg);
    });

    messages
}

// Both gauge widths read as "gauge" in the log line.
fn kind_label(metric: &Metric) -> &'static str {
    match metric {
        Metric::Gauge64(_) => "gauge",
        other => other.kind().as_str(),
    }
}

fn push_summary(msg: &mut String, s: &Summary) {
    let _ = write!(
        msg,
        " min: {} max: {} mean: {:.2} stddev: {:.2}",
        s.min, s.max, s.mean, s.std_dev
    );
    for (q, v) in &s.percentiles {
        if *q == 0.5 {
            let _ = write!(msg, " median: {v:.2}");
        } else {
            let _ = write!(msg, " {}%: {v:.2}", percentile_label(*q));
        }
    }
}

fn push_rates(msg: &mut String, r: &Rates, mean_field: &str) {
    let _ = write!(
        msg,
        " 1-min: {:.2} 5-min: {:.2} 15-min: {:.2} {mean_field}: {:.2}",
        r.m1, r.m5, r.m15, r.mean
    );
}

/// Wrap `body` in an RFC 3164 header: `<14>Mmm dd hh:mm:ss tag[pid]: body`.
pub fn frame(body: &str, now: chrono::DateTime<chrono::Local>) -> String {
    format!(
        "<{PRIORITY}>{} {TAG}[{}]: {body}",
        now.format("%b %e %H:%M:%S"),
        std::process::id()
    )
}

pub async fn report_once(
    path: &Path,
    registry: &Registry,
    opts: &ReportOptions,
) -> MetricsResult<()> {
    let socket = UnixDatagram::unbound()?;
    let now = chrono::Local::now();
    let messages = format_messages(registry, opts);
    for body in &messages {
        socket.send_to(frame(body, now).as_bytes(), path).await?;
    }
    debug!(path = %path.display(), messages = messages.len(), "flushed to syslog");
    Ok(())
}

pub async fn run(
    config: SyslogConfig,
    registry: Arc<Registry>,
    opts: ReportOptions,
    interval: Duration,
) {
    run_periodic("syslog", interval, || {
        report_once(&config.path, &registry, &opts)
    })
    .await
}
