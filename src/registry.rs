//! Name → metric lookup.
//!
//! A `Registry` is an ordinary value: create one, share it behind an `Arc`,
//! and hand it to whatever records or exports metrics. There is no global
//! default instance.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{MetricsError, MetricsResult};
use crate::metrics::{Counter, Gauge, Gauge64, Histogram, Meter, Metric, MetricKind, Timer};

#[derive(Debug, Default)]
pub struct Registry {
    prefix: Option<String>,
    metrics: RwLock<HashMap<String, Metric>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry whose exporters prepend `prefix.` to every metric name.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: (!prefix.is_empty()).then_some(prefix),
            metrics: RwLock::default(),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Register `metric` under `name`. An existing name is never overwritten.
    pub fn register(&self, name: impl Into<String>, metric: Metric) -> MetricsResult<()> {
        let name = name.into();
        match self.metrics.write().entry(name) {
            Entry::Occupied(slot) => Err(MetricsError::DuplicateMetric(slot.key().clone())),
            Entry::Vacant(slot) => {
                debug!(name = %slot.key(), kind = %metric.kind(), "registered metric");
                slot.insert(metric);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Metric> {
        self.metrics.read().get(name).cloned()
    }

    /// Return the metric registered under `name`, creating it with `factory`
    /// if there is none. Racing callers all get the same instance and the
    /// factory runs at most once per name.
    pub fn get_or_register<F>(&self, name: &str, factory: F) -> Metric
    where
        F: FnOnce() -> Metric,
    {
        if let Some(metric) = self.get(name) {
            return metric;
        }

        self.metrics
            .write()
            .entry(name.to_owned())
            .or_insert_with(factory)
            .clone()
    }

    /// Visit every metric in ascending name order. The visit works on a
    /// point-in-time copy, so `f` may itself use the registry.
    pub fn each<F>(&self, mut f: F)
    where
        F: FnMut(&str, &Metric),
    {
        let mut entries: Vec<(String, Metric)> = self
            .metrics
            .read()
            .iter()
            .map(|(name, metric)| (name.clone(), metric.clone()))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        for (name, metric) in &entries {
            f(name, metric);
        }
    }

    pub fn unregister(&self, name: &str) -> Option<Metric> {
        self.metrics.write().remove(name)
    }

    pub fn unregister_all(&self) {
        self.metrics.write().clear();
    }

    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }

    pub fn counter(&self, name: &str) -> MetricsResult<Arc<Counter>> {
        self.typed(name, MetricKind::Counter, Metric::counter, |m| match m {
            Metric::Counter(c) => Some(c),
            _ => None,
        })
    }

    pub fn gauge(&self, name: &str) -> MetricsResult<Arc<Gauge>> {
        self.typed(name, MetricKind::Gauge, Metric::gauge, |m| match m {
            Metric::Gauge(g) => Some(g),
            _ => None,
        })
    }

    pub fn gauge64(&self, name: &str) -> MetricsResult<Arc<Gauge64>> {
        self.typed(name, MetricKind::Gauge64, Metric::gauge64, |m| match m {
            Metric::Gauge64(g) => Some(g),
            _ => None,
        })
    }

    pub fn histogram(&self, name: &str) -> MetricsResult<Arc<Histogram>> {
        self.typed(name, MetricKind::Histogram, Metric::histogram, |m| match m {
            Metric::Histogram(h) => Some(h),
            _ => None,
        })
    }

    pub fn meter(&self, name: &str) -> MetricsResult<Arc<Meter>> {
        self.typed(name, MetricKind::Meter, Metric::meter, |m| match m {
            Metric::Meter(m) => Some(m),
            _ => None,
        })
    }

    pub fn timer(&self, name: &str) -> MetricsResult<Arc<Timer>> {
        self.typed(name, MetricKind::Timer, Metric::timer, |m| match m {
            Metric::Timer(t) => Some(t),
            _ => None,
        })
    }

    fn typed<T>(
        &self,
        name: &str,
        expected: MetricKind,
        factory: fn() -> Metric,
        pick: fn(Metric) -> Option<Arc<T>>,
    ) -> MetricsResult<Arc<T>> {
        let metric = self.get_or_register(name, factory);
        let found = metric.kind();
        pick(metric).ok_or_else(|| MetricsError::KindMismatch {
            name: name.to_owned(),
            expected,
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_is_an_error() {
        let registry = Registry::new();
        registry.register("requests", Metric::counter()).unwrap();

        let err = registry.register("requests", Metric::meter()).unwrap_err();
        assert!(matches!(err, MetricsError::DuplicateMetric(ref n) if n == "requests"));
        assert_eq!(registry.get("requests").unwrap().kind(), MetricKind::Counter);
    }

    #[test]
    fn unregister_then_replace() {
        let registry = Registry::new();
        registry.register("x", Metric::counter()).unwrap();
        assert!(registry.unregister("x").is_some());
        registry.register("x", Metric::gauge()).unwrap();
        assert_eq!(registry.get("x").unwrap().kind(), MetricKind::Gauge);
    }

    #[test]
    fn get_or_register_returns_existing_without_calling_factory() {
        let registry = Registry::new();
        let first = registry.counter("hits").unwrap();
        first.inc(3);

        let again = registry.get_or_register("hits", || panic!("factory must not run"));
        match again {
            Metric::Counter(c) => assert_eq!(c.count(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn typed_helper_reports_kind_mismatch() {
        let registry = Registry::new();
        registry.meter("m").unwrap();
        let err = registry.timer("m").unwrap_err();
        assert!(matches!(
            err,
            MetricsError::KindMismatch { expected: MetricKind::Timer, found: MetricKind::Meter, .. }
        ));
    }

    #[test]
    fn each_visits_in_name_order() {
        let registry = Registry::new();
        for name in ["b", "c", "a"] {
            registry.register(name, Metric::counter()).unwrap();
        }
        let mut seen = Vec::new();
        registry.each(|name, _| seen.push(name.to_owned()));
        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[test]
    fn each_allows_reentrant_registry_use() {
        let registry = Registry::new();
        registry.register("a", Metric::counter()).unwrap();
        registry.each(|_, _| {
            registry.register("b", Metric::counter()).unwrap();
        });
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn prefix_handling() {
        assert_eq!(Registry::new().prefix(), None);
        assert_eq!(Registry::with_prefix("").prefix(), None);
        assert_eq!(Registry::with_prefix("app").prefix(), Some("app"));
    }

    #[test]
    fn unregister_all_empties_registry() {
        let registry = Registry::new();
        registry.counter("a").unwrap();
        registry.timer("b").unwrap();
        registry.unregister_all();
        assert!(registry.is_empty());
    }
}
