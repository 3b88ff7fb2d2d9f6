//! Registry as a JSON object keyed by metric name.

use std::io::Write;

use serde_json::{json, Map, Value};

use super::{percentile_label, Rates, ReportOptions, Summary};
use crate::error::MetricsResult;
use crate::metrics::Metric;
use crate::registry::Registry;

/// Build `{ "<name>": { "count": .., "mean": .., "1m.rate": .. }, .. }`.
///
/// Names carry the registry prefix when one is set.
pub fn registry_json(registry: &Registry, opts: &ReportOptions) -> Value {
    let prefix = super::key_prefix(registry);
    let mut root = Map::new();
    registry.each(|name, metric| {
        root.insert(format!("{prefix}{name}"), metric_json(metric, opts));
    });
    Value::Object(root)
}

/// Serialize [`registry_json`] to `w`, followed by a newline.
pub fn write_json_once<W: Write>(
    registry: &Registry,
    opts: &ReportOptions,
    mut w: W,
) -> MetricsResult<()> {
    serde_json::to_writer(&mut w, &registry_json(registry, opts))?;
    w.write_all(b"\n")?;
    w.flush()?;
    Ok(())
}

fn metric_json(metric: &Metric, opts: &ReportOptions) -> Value {
    let mut fields = Map::new();
    match metric {
        Metric::Counter(c) => {
            fields.insert("count".into(), json!(c.count()));
        }
        Metric::Gauge(g) => {
            fields.insert("value".into(), json!(g.value()));
        }
        Metric::Gauge64(g) => {
            fields.insert("value".into(), json!(g.value()));
        }
        Metric::Histogram(h) => {
            fields.insert("count".into(), json!(h.count()));
            summary(&mut fields, Summary::of(&h.snapshot(), &opts.percentiles));
        }
        Metric::Meter(m) => {
            fields.insert("count".into(), json!(m.count()));
            rates(&mut fields, Rates::of_meter(m));
        }
        Metric::Timer(t) => {
            fields.insert("count".into(), json!(t.count()));
            summary(
                &mut fields,
                Summary::of_durations(&t.snapshot(), &opts.percentiles, opts.duration_unit),
            );
            rates(&mut fields, Rates::of_timer(t));
        }
    }
    Value::Object(fields)
}

fn summary(fields: &mut Map<String, Value>, s: Summary) {
    fields.insert("min".into(), json!(s.min));
    fields.insert("max".into(), json!(s.max));
    fields.insert("mean".into(), json!(s.mean));
    fields.insert("stddev".into(), json!(s.std_dev));
    for (q, v) in s.percentiles {
        let key = if q == 0.5 {
            "median".to_owned()
        } else {
            format!("{}%", percentile_label(q))
        };
        fields.insert(key, json!(v));
    }
}

fn rates(fields: &mut Map<String, Value>, r: Rates) {
    fields.insert("1m.rate".into(), json!(r.m1));
    fields.insert("5m.rate".into(), json!(r.m5));
    fields.insert("15m.rate".into(), json!(r.m15));
    fields.insert("mean.rate".into(), json!(r.mean));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn scalar_metrics() {
        let registry = Registry::new();
        registry.counter("c").unwrap().inc(4);
        registry.gauge("g").unwrap().update(-1);
        registry.gauge64("f").unwrap().update(2.5);

        let v = registry_json(&registry, &ReportOptions::default());
        assert_eq!(
            v,
            json!({
                "c": { "count": 4 },
                "f": { "value": 2.5 },
                "g": { "value": -1 },
            })
        );
    }

    #[test]
    fn histogram_keys() {
        let registry = Registry::new();
        let h = registry.histogram("h").unwrap();
        for v in [2, 4, 6, 8] {
            h.update(v);
        }

        let v = registry_json(&registry, &ReportOptions::default());
        let h = &v["h"];
        assert_eq!(h["count"], 4);
        assert_eq!(h["min"], 2);
        assert_eq!(h["max"], 8);
        assert_eq!(h["mean"], 5.0);
        assert_eq!(h["median"], 5.0);
        for key in ["75%", "95%", "98%", "99%", "99.9%"] {
            assert!(h.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn timer_has_rates_and_prefixed_name() {
        let registry = Registry::with_prefix("api");
        registry.timer("req").unwrap().update(Duration::from_millis(3));

        let v = registry_json(&registry, &ReportOptions::default());
        let t = &v["api.req"];
        assert_eq!(t["count"], 1);
        assert_eq!(t["max"], 3);
        for key in ["1m.rate", "5m.rate", "15m.rate", "mean.rate"] {
            assert!(t[key].is_f64(), "missing {key}");
        }
    }

    #[test]
    fn write_once_emits_one_line() {
        let registry = Registry::new();
        registry.counter("n").unwrap().inc(1);

        let mut out = Vec::new();
        write_json_once(&registry, &ReportOptions::default(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"n\":{\"count\":1}}\n");
    }
}
