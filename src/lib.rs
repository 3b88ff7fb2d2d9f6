//! Process-local application metrics.
//!
//! Counters, gauges, meters with exponentially weighted moving rates,
//! histograms backed by a forward-decaying reservoir, and timers combining
//! the two. Metrics are looked up by name in a [`Registry`] and pushed out by
//! the exporters in [`reporter`].

pub mod config;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod reporter;

pub use config::Config;
pub use error::{MetricsError, MetricsResult};
pub use metrics::{
    Clock, Counter, ExpDecayReservoir, Gauge, Gauge64, Histogram, ManualClock, Meter, Metric,
    MetricKind, Snapshot, SystemClock, Timer, TimerContext,
};
pub use registry::Registry;
pub use reporter::ReportOptions;
