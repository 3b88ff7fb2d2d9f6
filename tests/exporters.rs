//! Exporters against real sockets and the HTTP router.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tower::ServiceExt;

use decay_metrics::config::OpenTsdbConfig;
use decay_metrics::reporter::{graphite, http, opentsdb};
use decay_metrics::{Registry, ReportOptions};

async fn read_all(listener: TcpListener) -> String {
    let (mut conn, _) = listener.accept().await.unwrap();
    let mut buf = String::new();
    conn.read_to_string(&mut buf).await.unwrap();
    buf
}

fn sample_registry() -> Registry {
    let registry = Registry::with_prefix("app");
    registry.counter("hits").unwrap().inc(5);
    registry
        .timer("rpc")
        .unwrap()
        .update(Duration::from_millis(12));
    registry
}

#[tokio::test]
async fn graphite_sends_one_batch_per_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(read_all(listener));

    let registry = sample_registry();
    graphite::report_once(addr, &registry, &ReportOptions::default())
        .await
        .unwrap();

    let received = server.await.unwrap();
    let lines: Vec<&str> = received.lines().collect();
    assert!(lines[0].starts_with("app.hits.count 5 "));
    assert!(lines.iter().any(|l| l.starts_with("app.rpc.max 12 ")));
    assert!(lines.iter().any(|l| l.starts_with("app.rpc.99-percentile 12.00 ")));
    assert!(lines.iter().all(|l| l.split(' ').count() == 3));
}

#[tokio::test]
async fn opentsdb_tags_every_line_with_host() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = OpenTsdbConfig {
        addr: listener.local_addr().unwrap(),
        host: Some("node7".into()),
    };
    let server = tokio::spawn(read_all(listener));

    opentsdb::report_once(&config, &sample_registry(), &ReportOptions::default())
        .await
        .unwrap();

    let received = server.await.unwrap();
    assert!(received.starts_with("put app.hits.count "));
    assert!(received.lines().all(|l| l.ends_with(" host=node7")));
}

#[tokio::test]
async fn exporter_reports_connection_failure() {
    // Bind then drop to get a port nothing listens on.
    let addr = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();
    let err = graphite::report_once(addr, &Registry::new(), &ReportOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, decay_metrics::MetricsError::Io(_)));
}

fn http_state(registry: Arc<Registry>) -> Arc<http::HttpState> {
    Arc::new(http::HttpState {
        registry,
        opts: ReportOptions::default(),
        stream_interval: Duration::from_millis(100),
    })
}

#[tokio::test]
async fn http_metrics_returns_json_snapshot() {
    let registry = Arc::new(sample_registry());
    let app = http::router(http_state(registry.clone()));

    let response = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("server-timing"));

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["app.hits"]["count"], 5);
    assert_eq!(json["app.rpc"]["max"], 12);

    // The request itself was timed.
    assert_eq!(registry.timer(http::REQUEST_TIMER).unwrap().count(), 1);
}

#[tokio::test]
async fn http_stream_is_event_stream() {
    let app = http::router(http_state(Arc::new(sample_registry())));

    let response = app
        .oneshot(
            Request::get("/metrics/stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );
}

#[tokio::test]
async fn http_stream_tolerates_zero_interval() {
    let state = Arc::new(http::HttpState {
        registry: Arc::new(sample_registry()),
        opts: ReportOptions::default(),
        stream_interval: Duration::ZERO,
    });

    let response = http::router(state)
        .oneshot(
            Request::get("/metrics/stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = http::router(http_state(Arc::new(Registry::new())));
    let response = app
        .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
