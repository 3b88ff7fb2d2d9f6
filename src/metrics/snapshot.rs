use serde::Serialize;

use crate::error::{MetricsError, MetricsResult};

/// Quantiles reported by [`Snapshot::percentiles`]: median, 75th, 95th, 98th,
/// 99th and 99.9th.
pub const DEFAULT_PERCENTILES: [f64; 6] = [0.5, 0.75, 0.95, 0.98, 0.99, 0.999];

/// Immutable, sorted copy of the sampled values at capture time.
///
/// Owns its data outright, so statistics are computed without holding any
/// lock on the reservoir it came from. Every statistic of an empty snapshot
/// is zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    values: Vec<i64>,
}

impl Snapshot {
    pub fn new(mut values: Vec<i64>) -> Self {
        values.sort_unstable();
        Self { values }
    }

    /// Value at `quantile`, linearly interpolated between the two bracketing
    /// order statistics. Fails for a quantile outside `[0, 1]`.
    pub fn value(&self, quantile: f64) -> MetricsResult<f64> {
        if !(0.0..=1.0).contains(&quantile) {
            return Err(MetricsError::InvalidQuantile(quantile));
        }
        Ok(self.quantile(quantile))
    }

    fn quantile(&self, quantile: f64) -> f64 {
        let Some((&first, &last)) = self.values.first().zip(self.values.last()) else {
            return 0.0;
        };

        let n = self.values.len() as f64;
        let pos = quantile * (n + 1.0);
        if pos < 1.0 {
            return first as f64;
        }
        if pos >= n {
            return last as f64;
        }

        let idx = pos as usize;
        let lower = self.values[idx - 1] as f64;
        let upper = self.values[idx] as f64;
        lower + (pos - pos.floor()) * (upper - lower)
    }

    /// Sorted sample values.
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn min(&self) -> i64 {
        self.values.first().copied().unwrap_or(0)
    }

    pub fn max(&self) -> i64 {
        self.values.last().copied().unwrap_or(0)
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.values.iter().map(|v| *v as f64).sum();
        sum / self.values.len() as f64
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let sum_sq: f64 = self
            .values
            .iter()
            .map(|v| {
                let diff = *v as f64 - mean;
                diff * diff
            })
            .sum();
        (sum_sq / self.values.len() as f64).sqrt()
    }

    pub fn median(&self) -> f64 {
        self.quantile(0.5)
    }

    pub fn p75(&self) -> f64 {
        self.quantile(0.75)
    }

    pub fn p95(&self) -> f64 {
        self.quantile(0.95)
    }

    pub fn p98(&self) -> f64 {
        self.quantile(0.98)
    }

    pub fn p99(&self) -> f64 {
        self.quantile(0.99)
    }

    pub fn p999(&self) -> f64 {
        self.quantile(0.999)
    }

    /// Values at [`DEFAULT_PERCENTILES`], in that order.
    pub fn percentiles(&self) -> Vec<f64> {
        DEFAULT_PERCENTILES.iter().map(|q| self.quantile(*q)).collect()
    }

    /// Values at each of `quantiles`, in the order given.
    pub fn percentiles_at(&self, quantiles: &[f64]) -> MetricsResult<Vec<f64>> {
        quantiles.iter().map(|q| self.value(*q)).collect()
    }
}
