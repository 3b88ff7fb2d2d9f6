//! HTTP exporter: a JSON snapshot on `GET /metrics` and a Server-Sent Events
//! feed on `GET /metrics/stream`.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::{self as axum_mw, Next},
    response::{
        sse::{Event, KeepAlive, Sse},
        Response,
    },
    routing::get,
    Json, Router,
};
use serde_json::Value;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use super::json::registry_json;
use super::ReportOptions;
use crate::error::MetricsResult;
use crate::registry::Registry;

/// Timer fed with the wall time of every request served.
pub const REQUEST_TIMER: &str = "http.requests";

/// Shared state available to every handler via `State<Arc<HttpState>>`.
#[derive(Debug)]
pub struct HttpState {
    pub registry: Arc<Registry>,
    pub opts: ReportOptions,
    /// How often the SSE stream pushes a snapshot.
    pub stream_interval: Duration,
}

pub fn router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/metrics", get(get_metrics))
        .route("/metrics/stream", get(metrics_stream))
        .layer(axum_mw::from_fn_with_state(state.clone(), timing))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Bind `addr` and serve [`router`] until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, state: Arc<HttpState>, shutdown: F) -> MetricsResult<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "http exporter listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// ─── GET /metrics ────────────────────────────────────────────────

async fn get_metrics(State(state): State<Arc<HttpState>>) -> Json<Value> {
    Json(registry_json(&state.registry, &state.opts))
}

// ─── GET /metrics/stream ─────────────────────────────────────────

async fn metrics_stream(
    State(state): State<Arc<HttpState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    // `interval` panics on a zero period.
    let period = state.stream_interval.max(Duration::from_millis(1));
    let interval = tokio::time::interval(period);

    let stream = IntervalStream::new(interval).map(move |_| {
        let body = registry_json(&state.registry, &state.opts).to_string();
        Ok(Event::default().data(body))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

// ─── Request timing ──────────────────────────────────────────────

/// Records each request into [`REQUEST_TIMER`] and reports the same value in
/// a `Server-Timing` header. The SSE route is skipped since its responses are
/// returned before the stream ends.
async fn timing(State(state): State<Arc<HttpState>>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = start.elapsed();

    if path.ends_with("/stream") {
        return response;
    }

    match state.registry.timer(REQUEST_TIMER) {
        Ok(timer) => timer.update(elapsed),
        Err(e) => warn!(error = %e, "request timer unavailable"),
    }

    let server_timing = format!("total;dur={:.3}", elapsed.as_secs_f64() * 1000.0);
    if let Ok(val) = server_timing.parse() {
        response.headers_mut().insert("Server-Timing", val);
    }
    debug!(status = response.status().as_u16(), %path, us = elapsed.as_micros() as u64, "served");

    response
}
