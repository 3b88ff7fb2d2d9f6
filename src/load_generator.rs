use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use tracing::{debug, info};

use decay_metrics::config::{LoadConfig, ReservoirConfig};
use decay_metrics::metrics::{Counter, Gauge, Histogram, Meter, Metric, Timer};
use decay_metrics::{MetricsResult, Registry};

// ─── Metric handles ──────────────────────────────────────────────

/// Everything a worker records into, resolved once up front.
struct Handles {
    latency: Arc<Timer>,
    requests: Arc<Meter>,
    errors: Arc<Counter>,
    in_flight: Arc<Counter>,
    workers: Arc<Gauge>,
    payload: Arc<Histogram>,
}

impl Handles {
    fn resolve(registry: &Registry, reservoir: &ReservoirConfig) -> MetricsResult<Self> {
        // Registered by hand so the reservoirs follow the configuration.
        registry.get_or_register("load.latency", || Metric::from(Arc::new(reservoir.timer())));
        registry.get_or_register("load.payload.bytes", || {
            Metric::from(Arc::new(reservoir.histogram()))
        });

        Ok(Self {
            latency: registry.timer("load.latency")?,
            requests: registry.meter("load.requests")?,
            errors: registry.counter("load.errors")?,
            in_flight: registry.counter("load.in_flight")?,
            workers: registry.gauge("load.workers")?,
            payload: registry.histogram("load.payload.bytes")?,
        })
    }
}

// ─── Public entry point ──────────────────────────────────────────

/// Spawns `config.concurrency` Tokio tasks that record synthetic traffic
/// until the deadline (if any) passes or `running` is set to false.
pub async fn run(
    running: Arc<AtomicBool>,
    registry: Arc<Registry>,
    config: LoadConfig,
    reservoir: ReservoirConfig,
) -> MetricsResult<()> {
    let handles = Arc::new(Handles::resolve(&registry, &reservoir)?);
    let deadline = (config.duration_secs > 0)
        .then(|| Instant::now() + Duration::from_secs(config.duration_secs));

    info!(
        workers = config.concurrency,
        duration_secs = config.duration_secs,
        "load generator started"
    );

    handles.workers.update(i64::from(config.concurrency));
    let mut tasks = Vec::with_capacity(config.concurrency as usize);
    for worker_id in 0..config.concurrency {
        let running = running.clone();
        let handles = handles.clone();
        tasks.push(tokio::spawn(async move {
            worker(worker_id, running, handles, deadline).await;
        }));
    }

    for t in tasks {
        let _ = t.await;
    }

    running.store(false, Ordering::SeqCst);
    handles.workers.update(0);
    info!(
        requests = handles.requests.count(),
        errors = handles.errors.count(),
        "load generator finished"
    );
    Ok(())
}

// ─── Worker loop ─────────────────────────────────────────────────

async fn worker(
    id: u32,
    running: Arc<AtomicBool>,
    handles: Arc<Handles>,
    deadline: Option<Instant>,
) {
    // Each worker gets its own deterministic RNG seeded uniquely.
    let mut rng = StdRng::seed_from_u64(1000 + id as u64);

    while running.load(Ordering::Relaxed) && deadline.map_or(true, |d| Instant::now() < d) {
        simulate_request(&mut rng, &handles).await;
    }
    debug!(worker = id, "worker stopped");
}

async fn simulate_request(rng: &mut StdRng, handles: &Handles) {
    // Mostly fast calls with an occasional slow tail.
    let millis = if rng.gen_bool(0.95) {
        rng.gen_range(1..=20u64)
    } else {
        rng.gen_range(50..=250u64)
    };
    let failed = rng.gen_bool(0.02);
    let bytes = rng.gen_range(128..=64 * 1024i64);

    handles.in_flight.inc(1);
    handles
        .latency
        .time_async(tokio::time::sleep(Duration::from_millis(millis)))
        .await;
    handles.in_flight.dec(1);

    handles.requests.mark_one();
    handles.payload.update(bytes);
    if failed {
        handles.errors.inc(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn records_until_deadline() {
        let registry = Arc::new(Registry::new());
        let config = LoadConfig {
            concurrency: 2,
            duration_secs: 2,
        };
        run(
            Arc::new(AtomicBool::new(true)),
            registry.clone(),
            config,
            ReservoirConfig::default(),
        )
        .await
        .unwrap();

        let requests = registry.meter("load.requests").unwrap().count();
        assert!(requests > 0);
        assert_eq!(registry.timer("load.latency").unwrap().count(), requests);
        assert_eq!(registry.counter("load.in_flight").unwrap().count(), 0);
        assert_eq!(registry.gauge("load.workers").unwrap().value(), 0);
        assert_eq!(
            registry.histogram("load.payload.bytes").unwrap().count(),
            requests
        );
    }

    #[tokio::test(start_paused = true)]
    async fn configured_reservoir_applies_to_every_distribution() {
        let registry = Arc::new(Registry::new());
        let reservoir = ReservoirConfig {
            size: 16,
            alpha: 0.0,
        };
        run(
            Arc::new(AtomicBool::new(true)),
            registry.clone(),
            LoadConfig {
                concurrency: 4,
                duration_secs: 5,
            },
            reservoir,
        )
        .await
        .unwrap();

        let latency = registry.timer("load.latency").unwrap();
        assert!(latency.count() > 16);
        assert_eq!(latency.snapshot().size(), 16);
        let payload = registry.histogram("load.payload.bytes").unwrap();
        assert_eq!(payload.reservoir().capacity(), 16);
        assert_eq!(payload.reservoir().alpha(), 0.0);
    }

    #[tokio::test]
    async fn stops_when_flag_cleared() {
        let registry = Arc::new(Registry::new());
        let running = Arc::new(AtomicBool::new(false));
        run(
            running,
            registry.clone(),
            LoadConfig::default(),
            ReservoirConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(registry.meter("load.requests").unwrap().count(), 0);
    }
}
