//! Human-readable dump, one block per metric, sorted by name.

use std::io::Write;

use super::{percentile_label, Rates, ReportOptions, Summary};
use crate::error::MetricsResult;
use crate::metrics::Metric;
use crate::registry::Registry;

pub fn write_once<W: Write>(registry: &Registry, opts: &ReportOptions, w: &mut W) -> MetricsResult<()> {
    let mut result = Ok(());
    registry.each(|name, metric| {
        if result.is_ok() {
            result = write_metric(w, opts, name, metric);
        }
    });
    result?;
    w.flush()?;
    Ok(())
}

fn write_metric<W: Write>(
    w: &mut W,
    opts: &ReportOptions,
    name: &str,
    metric: &Metric,
) -> std::io::Result<()> {
    writeln!(w, "{} {name}", metric.kind())?;
    match metric {
        Metric::Counter(c) => writeln!(w, "  count:       {:9}", c.count()),
        Metric::Gauge(g) => writeln!(w, "  value:       {:9}", g.value()),
        Metric::Gauge64(g) => writeln!(w, "  value:       {:.6}", g.value()),
        Metric::Histogram(h) => {
            writeln!(w, "  count:       {:9}", h.count())?;
            write_summary(w, &Summary::of(&h.snapshot(), &opts.percentiles))
        }
        Metric::Meter(m) => {
            writeln!(w, "  count:       {:9}", m.count())?;
            write_rates(w, &Rates::of_meter(m))
        }
        Metric::Timer(t) => {
            writeln!(w, "  count:       {:9}", t.count())?;
            let summary =
                Summary::of_durations(&t.snapshot(), &opts.percentiles, opts.duration_unit);
            write_summary(w, &summary)?;
            write_rates(w, &Rates::of_timer(t))
        }
    }
}

fn write_summary<W: Write>(w: &mut W, s: &Summary) -> std::io::Result<()> {
    writeln!(w, "  min:         {:9}", s.min)?;
    writeln!(w, "  max:         {:9}", s.max)?;
    writeln!(w, "  mean:        {:12.2}", s.mean)?;
    writeln!(w, "  stddev:      {:12.2}", s.std_dev)?;
    for (q, v) in &s.percentiles {
        let label = if *q == 0.5 {
            "median:".to_owned()
        } else {
            format!("{}%:", percentile_label(*q))
        };
        writeln!(w, "  {label:<13}{v:12.2}")?;
    }
    Ok(())
}

fn write_rates<W: Write>(w: &mut W, r: &Rates) -> std::io::Result<()> {
    writeln!(w, "  1-min rate:  {:12.2}", r.m1)?;
    writeln!(w, "  5-min rate:  {:12.2}", r.m5)?;
    writeln!(w, "  15-min rate: {:12.2}", r.m15)?;
    writeln!(w, "  mean rate:   {:12.2}", r.mean)
}
