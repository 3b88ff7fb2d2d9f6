use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{MetricsError, MetricsResult};
use crate::metrics::{
    ExpDecayReservoir, Histogram, Meter, Timer, DEFAULT_ALPHA, DEFAULT_PERCENTILES,
    DEFAULT_RESERVOIR_SIZE,
};

// ─── Top level ───────────────────────────────────────────────────

/// Daemon configuration. Every field has a default, so `{}` is a valid file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reservoir: ReservoirConfig,
    pub reporting: ReportingConfig,
    pub graphite: Option<GraphiteConfig>,
    pub opentsdb: Option<OpenTsdbConfig>,
    pub syslog: Option<SyslogConfig>,
    /// Emit every metric as a `tracing` event each flush.
    pub log_reporter: bool,
    pub http: Option<HttpConfig>,
    pub load: LoadConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reservoir: ReservoirConfig::default(),
            reporting: ReportingConfig::default(),
            graphite: None,
            opentsdb: None,
            syslog: None,
            log_reporter: true,
            http: Some(HttpConfig::default()),
            load: LoadConfig::default(),
        }
    }
}

impl Config {
    /// Read and validate a JSON config file.
    pub fn from_path(path: &Path) -> MetricsResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> MetricsResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MetricsResult<()> {
        if self.reservoir.size == 0 {
            return Err(MetricsError::Config("reservoir.size must be at least 1".into()));
        }
        if !self.reservoir.alpha.is_finite() || self.reservoir.alpha < 0.0 {
            return Err(MetricsError::Config(
                "reservoir.alpha must be a finite, non-negative number".into(),
            ));
        }
        if self.reporting.flush_interval_secs == 0 {
            return Err(MetricsError::Config(
                "reporting.flush_interval_secs must be at least 1".into(),
            ));
        }
        if let Some(p) = self
            .reporting
            .percentiles
            .iter()
            .find(|p| !(0.0..=1.0).contains(*p))
        {
            return Err(MetricsError::Config(format!(
                "reporting.percentiles: {p} is not in [0, 1]"
            )));
        }
        if self.http.as_ref().is_some_and(|h| h.stream_interval_ms == 0) {
            return Err(MetricsError::Config(
                "http.stream_interval_ms must be at least 1".into(),
            ));
        }
        if self.load.concurrency > 500 {
            return Err(MetricsError::Config(
                "load.concurrency must be between 0 and 500".into(),
            ));
        }
        Ok(())
    }
}

// ─── Sections ────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReservoirConfig {
    pub size: usize,
    pub alpha: f64,
}

impl ReservoirConfig {
    pub fn reservoir(&self) -> ExpDecayReservoir {
        ExpDecayReservoir::new(self.size, self.alpha)
    }

    pub fn histogram(&self) -> Histogram {
        Histogram::with_reservoir(self.reservoir())
    }

    pub fn timer(&self) -> Timer {
        Timer::with_parts(self.histogram(), Meter::new())
    }
}

impl Default for ReservoirConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_RESERVOIR_SIZE,
            alpha: DEFAULT_ALPHA,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub flush_interval_secs: u64,
    /// Unit timer statistics are converted to before export.
    pub duration_unit: DurationUnit,
    /// Quantiles exported for histograms and timers.
    pub percentiles: Vec<f64>,
    /// Registry-wide name prefix; empty for none.
    pub prefix: String,
}

impl ReportingConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: 10,
            duration_unit: DurationUnit::default(),
            percentiles: DEFAULT_PERCENTILES.to_vec(),
            prefix: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    #[serde(alias = "ns")]
    Nanoseconds,
    #[serde(alias = "us")]
    Microseconds,
    #[default]
    #[serde(alias = "ms")]
    Milliseconds,
    #[serde(alias = "s")]
    Seconds,
}

impl DurationUnit {
    /// Nanoseconds per unit.
    pub fn nanos(&self) -> i64 {
        match self {
            Self::Nanoseconds => 1,
            Self::Microseconds => 1_000,
            Self::Milliseconds => 1_000_000,
            Self::Seconds => 1_000_000_000,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Nanoseconds => "ns",
            Self::Microseconds => "us",
            Self::Milliseconds => "ms",
            Self::Seconds => "s",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphiteConfig {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenTsdbConfig {
    pub addr: SocketAddr,
    /// `host=` tag. Defaults to the short form of `$HOSTNAME`.
    #[serde(default)]
    pub host: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyslogConfig {
    #[serde(default = "default_syslog_path")]
    pub path: PathBuf,
}

fn default_syslog_path() -> PathBuf {
    PathBuf::from("/dev/log")
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// SSE push period.
    #[serde(default = "default_stream_interval_ms")]
    pub stream_interval_ms: u64,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_stream_interval_ms() -> u64 {
    1_000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            stream_interval_ms: default_stream_interval_ms(),
        }
    }
}

/// Synthetic workload driven by the demo daemon.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Number of concurrent workers; 0 disables the generator.
    pub concurrency: u32,
    /// How long the workload runs; 0 runs until shutdown.
    pub duration_secs: u64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            duration_secs: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.reservoir.size, DEFAULT_RESERVOIR_SIZE);
        assert_eq!(config.reporting.flush_interval(), Duration::from_secs(10));
        assert_eq!(config.reporting.duration_unit, DurationUnit::Milliseconds);
        assert!(config.graphite.is_none());
        assert_eq!(config.http.unwrap().bind.port(), 3000);
    }

    #[test]
    fn parses_exporter_sections() {
        let config = Config::from_json(
            r#"{
                "reporting": { "duration_unit": "us", "percentiles": [0.5, 0.99] },
                "graphite": { "addr": "127.0.0.1:2003" },
                "opentsdb": { "addr": "127.0.0.1:4242", "host": "web1" },
                "syslog": {}
            }"#,
        )
        .unwrap();

        assert_eq!(config.reporting.duration_unit, DurationUnit::Microseconds);
        assert_eq!(config.reporting.percentiles, vec![0.5, 0.99]);
        assert_eq!(config.graphite.unwrap().addr.port(), 2003);
        assert_eq!(config.opentsdb.unwrap().host.as_deref(), Some("web1"));
        assert_eq!(config.syslog.unwrap().path, PathBuf::from("/dev/log"));
    }

    #[test]
    fn rejects_invalid_values() {
        for raw in [
            r#"{ "reservoir": { "size": 0 } }"#,
            r#"{ "reservoir": { "alpha": -1.0 } }"#,
            r#"{ "reporting": { "flush_interval_secs": 0 } }"#,
            r#"{ "reporting": { "percentiles": [1.5] } }"#,
            r#"{ "load": { "concurrency": 1000 } }"#,
            r#"{ "http": { "stream_interval_ms": 0 } }"#,
        ] {
            assert!(
                matches!(Config::from_json(raw), Err(MetricsError::Config(_))),
                "accepted {raw}"
            );
        }
    }

    #[test]
    fn reservoir_section_builds_metrics() {
        let config = Config::from_json(r#"{ "reservoir": { "size": 8, "alpha": 0.5 } }"#).unwrap();
        let histogram = config.reservoir.histogram();
        assert_eq!(histogram.reservoir().capacity(), 8);
        assert_eq!(histogram.reservoir().alpha(), 0.5);

        let timer = config.reservoir.timer();
        for ms in 0..20 {
            timer.update(Duration::from_millis(ms));
        }
        assert_eq!(timer.count(), 20);
        assert_eq!(timer.snapshot().size(), 8);
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        assert!(matches!(Config::from_json("{"), Err(MetricsError::Json(_))));
    }
}
