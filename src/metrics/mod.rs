pub mod clock;
pub mod counter;
pub mod ewma;
pub mod gauge;
pub mod histogram;
pub mod meter;
pub mod reservoir;
pub mod sample_store;
pub mod snapshot;
pub mod timer;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::Counter;
pub use ewma::{Ewma, TICK_INTERVAL};
pub use gauge::{Gauge, Gauge64};
pub use histogram::Histogram;
pub use meter::Meter;
pub use reservoir::{ExpDecayReservoir, DEFAULT_ALPHA, DEFAULT_RESERVOIR_SIZE, RESCALE_THRESHOLD};
pub use snapshot::{Snapshot, DEFAULT_PERCENTILES};
pub use timer::{Timer, TimerContext};

/// A registered metric. Cloning is cheap: every variant shares its instance.
///
/// Exporters match on this exhaustively, so adding a kind is a compile error
/// everywhere it still needs handling.
#[derive(Debug, Clone)]
pub enum Metric {
    Counter(Arc<Counter>),
    Gauge(Arc<Gauge>),
    Gauge64(Arc<Gauge64>),
    Histogram(Arc<Histogram>),
    Meter(Arc<Meter>),
    Timer(Arc<Timer>),
}

impl Metric {
    pub fn counter() -> Self {
        Self::Counter(Arc::default())
    }

    pub fn gauge() -> Self {
        Self::Gauge(Arc::default())
    }

    pub fn gauge64() -> Self {
        Self::Gauge64(Arc::default())
    }

    pub fn histogram() -> Self {
        Self::Histogram(Arc::default())
    }

    pub fn meter() -> Self {
        Self::Meter(Arc::default())
    }

    pub fn timer() -> Self {
        Self::Timer(Arc::default())
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Counter(_) => MetricKind::Counter,
            Self::Gauge(_) => MetricKind::Gauge,
            Self::Gauge64(_) => MetricKind::Gauge64,
            Self::Histogram(_) => MetricKind::Histogram,
            Self::Meter(_) => MetricKind::Meter,
            Self::Timer(_) => MetricKind::Timer,
        }
    }
}

impl From<Arc<Counter>> for Metric {
    fn from(m: Arc<Counter>) -> Self {
        Self::Counter(m)
    }
}

impl From<Arc<Gauge>> for Metric {
    fn from(m: Arc<Gauge>) -> Self {
        Self::Gauge(m)
    }
}

impl From<Arc<Gauge64>> for Metric {
    fn from(m: Arc<Gauge64>) -> Self {
        Self::Gauge64(m)
    }
}

impl From<Arc<Histogram>> for Metric {
    fn from(m: Arc<Histogram>) -> Self {
        Self::Histogram(m)
    }
}

impl From<Arc<Meter>> for Metric {
    fn from(m: Arc<Meter>) -> Self {
        Self::Meter(m)
    }
}

impl From<Arc<Timer>> for Metric {
    fn from(m: Arc<Timer>) -> Self {
        Self::Timer(m)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Gauge64,
    Histogram,
    Meter,
    Timer,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Gauge64 => "gauge64",
            Self::Histogram => "histogram",
            Self::Meter => "meter",
            Self::Timer => "timer",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
