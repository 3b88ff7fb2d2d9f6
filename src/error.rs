//! Error type shared by the registry, snapshots, config loading and exporters.
//!
//! Recording paths (`mark`, `update`, `inc`, ...) never fail. Errors only
//! surface from registration, malformed percentile arguments, configuration
//! and exporter I/O.

use thiserror::Error;

use crate::metrics::MetricKind;

/// Result alias used across the crate.
pub type MetricsResult<T> = Result<T, MetricsError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MetricsError {
    /// A metric with this name is already registered. Unregister it first
    /// to replace it.
    #[error("duplicate metric: {0}")]
    DuplicateMetric(String),

    /// The name is registered, but holds a different kind of metric.
    #[error("metric {name} is a {found}, not a {expected}")]
    KindMismatch {
        name: String,
        expected: MetricKind,
        found: MetricKind,
    },

    /// Percentile outside `[0, 1]` (or NaN).
    #[error("quantile {0} is not in [0, 1]")]
    InvalidQuantile(f64),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
