use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use decay_metrics::reporter::{self, http::HttpState};
use decay_metrics::{Config, Metric, MetricsResult, Registry, ReportOptions};

mod load_generator;

#[derive(Parser, Debug)]
#[command(
    name = "decay-metrics",
    version,
    about = "Synthetic workload recorded into decaying histograms, meters and timers"
)]
struct Args {
    /// JSON configuration file; defaults apply when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,

    /// HTTP exporter bind address (overrides config file)
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> MetricsResult<()> {
    // ── 1. Configuration ─────────────────────────────────────────
    let mut config = match &args.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };
    if let (Some(bind), Some(http)) = (args.bind, config.http.as_mut()) {
        http.bind = bind;
    }

    // ── 2. Shared registry ───────────────────────────────────────
    let registry = Arc::new(Registry::with_prefix(config.reporting.prefix.clone()));
    let opts = ReportOptions::from(&config.reporting);
    let flush = config.reporting.flush_interval();

    // ── 3. Periodic exporters ────────────────────────────────────
    let mut exporters: Vec<JoinHandle<()>> = Vec::new();
    if let Some(graphite) = &config.graphite {
        info!(addr = %graphite.addr, "graphite exporter enabled");
        exporters.push(tokio::spawn(reporter::graphite::run(
            graphite.addr,
            registry.clone(),
            opts.clone(),
            flush,
        )));
    }
    if let Some(opentsdb) = config.opentsdb.clone() {
        info!(addr = %opentsdb.addr, "opentsdb exporter enabled");
        exporters.push(tokio::spawn(reporter::opentsdb::run(
            opentsdb,
            registry.clone(),
            opts.clone(),
            flush,
        )));
    }
    if let Some(syslog) = config.syslog.clone() {
        spawn_syslog(&mut exporters, syslog, &registry, &opts, flush);
    }
    if config.log_reporter {
        exporters.push(tokio::spawn(reporter::log::run(
            registry.clone(),
            opts.clone(),
            flush,
        )));
    }

    // ── 4. Load generator ────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let load = (config.load.concurrency > 0).then(|| {
        tokio::spawn(load_generator::run(
            running.clone(),
            registry.clone(),
            config.load.clone(),
            config.reservoir.clone(),
        ))
    });

    // ── 5. Serve until Ctrl-C ────────────────────────────────────
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
        }
    };
    match &config.http {
        Some(http) => {
            registry.get_or_register(reporter::http::REQUEST_TIMER, || {
                Metric::from(Arc::new(config.reservoir.timer()))
            });
            let state = Arc::new(HttpState {
                registry: registry.clone(),
                opts: opts.clone(),
                stream_interval: Duration::from_millis(http.stream_interval_ms),
            });
            reporter::http::serve(http.bind, state, shutdown).await?;
        }
        None => shutdown.await,
    }
    info!("shutting down");

    // ── 6. Stop workers, final dump ──────────────────────────────
    running.store(false, Ordering::SeqCst);
    if let Some(handle) = load {
        match handle.await {
            Ok(Err(e)) => warn!(error = %e, "load generator failed"),
            Err(e) => warn!(error = %e, "load generator panicked"),
            Ok(Ok(())) => {}
        }
    }
    for handle in exporters {
        handle.abort();
    }

    reporter::text::write_once(&registry, &opts, &mut io::stdout().lock())
}

#[cfg(unix)]
fn spawn_syslog(
    exporters: &mut Vec<JoinHandle<()>>,
    config: decay_metrics::config::SyslogConfig,
    registry: &Arc<Registry>,
    opts: &ReportOptions,
    flush: Duration,
) {
    info!(path = %config.path.display(), "syslog exporter enabled");
    exporters.push(tokio::spawn(reporter::syslog::run(
        config,
        registry.clone(),
        opts.clone(),
        flush,
    )));
}

#[cfg(not(unix))]
fn spawn_syslog(
    _exporters: &mut Vec<JoinHandle<()>>,
    _config: decay_metrics::config::SyslogConfig,
    _registry: &Arc<Registry>,
    _opts: &ReportOptions,
    _flush: Duration,
) {
    warn!("syslog exporter is only available on unix");
}
