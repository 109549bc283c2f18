use serde_json::{json, Value};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, time::sleep};

use traffic_logger::{
    app::create_app,
    config::{AppConfig, LoggingConfig, LoggingMode, ServerConfig},
    middleware::{MemorySink, Severity, TrafficLogging},
    AppState,
};

async fn spawn_app(logging: LoggingConfig) -> (String, MemorySink) {
    spawn_app_with(AppConfig {
        logging,
        ..AppConfig::default()
    })
    .await
}

async fn spawn_app_with(config: AppConfig) -> (String, MemorySink) {
    let sink = MemorySink::new();
    let traffic = TrafficLogging::from_config(&config.logging, Arc::new(sink.clone())).unwrap();
    let state = AppState {
        config: Arc::new(config),
    };
    let app = create_app(state, &traffic);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    (format!("http://{}", addr), sink)
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        ignore_routes: vec!["/health".to_string(), "/api/v1/accounts/*/holder".to_string()],
        ..LoggingConfig::default()
    }
}

/// Records are emitted once the server has finished with the body, which can
/// land just after the client has read it.
async fn wait_for_records(sink: &MemorySink, expected: usize) {
    for _ in 0..200 {
        if sink.len() >= expected {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {} records, found {}", expected, sink.len());
}

#[tokio::test]
async fn test_health_endpoint_is_not_logged() {
    let (base_url, sink) = spawn_app(default_logging()).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/health", base_url)).send().await.unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["logging"]["mode"], "all");

    sleep(Duration::from_millis(100)).await;
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_echo_is_logged_with_both_bodies() {
    let (base_url, sink) = spawn_app(default_logging()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/v1/echo?trace=yes", base_url))
        .header("x-request-id", "it-echo-1")
        .json(&json!({ "name": "alice" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "echo": { "name": "alice" } }));

    wait_for_records(&sink, 1).await;
    let records = sink.records();
    let (severity, record) = &records[0];
    assert_eq!(*severity, Severity::Info);
    assert_eq!(record.request_id, "it-echo-1");
    assert_eq!(record.request.query["trace"], "yes");
    assert_eq!(record.request.body, Some(json!({ "name": "alice" })));
    assert_eq!(record.response.body, Some(json!({ "echo": { "name": "alice" } })));
    assert!(record
        .request
        .remote_addr
        .as_deref()
        .is_some_and(|addr| addr.starts_with("127.0.0.1:")));
}

#[tokio::test]
async fn test_ignore_pattern_needs_a_segment_after_the_prefix() {
    let (base_url, sink) = spawn_app(default_logging()).await;
    let client = reqwest::Client::new();

    let holder = client
        .get(format!("{}/api/v1/accounts/42/holder", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(holder.status(), 200);
    let body: Value = holder.json().await.unwrap();
    assert_eq!(body["account_id"], "42");

    let bare = client
        .get(format!("{}/api/v1/accounts", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(bare.status(), 404);
    bare.bytes().await.unwrap();

    wait_for_records(&sink, 1).await;
    sleep(Duration::from_millis(50)).await;
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, Severity::Warn);
    assert_eq!(records[0].1.request.path, "/api/v1/accounts");
    assert!(records[0].1.elapsed_ms.is_some());
}

#[tokio::test]
async fn test_stream_delivers_all_chunks_and_logs_the_first() {
    let (base_url, sink) = spawn_app(default_logging()).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/v1/stream", base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.text().await.unwrap(), r#"{"a":1}{"a":2}"#);

    wait_for_records(&sink, 1).await;
    assert_eq!(sink.records()[0].1.response.body, Some(json!({ "a": 1 })));
}

#[tokio::test]
async fn test_rejected_payload_is_a_warning() {
    let (base_url, sink) = spawn_app(default_logging()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/v1/echo", base_url))
        .header("content-type", "application/json")
        .body("null")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 422);
    resp.bytes().await.unwrap();

    wait_for_records(&sink, 1).await;
    assert_eq!(sink.records()[0].0, Severity::Warn);
}

#[tokio::test]
async fn test_mode_none_installs_nothing() {
    let (base_url, sink) = spawn_app(LoggingConfig {
        mode: LoggingMode::None,
        ..LoggingConfig::default()
    })
    .await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/v1/stream", base_url))
        .send()
        .await
        .unwrap();
    resp.bytes().await.unwrap();

    sleep(Duration::from_millis(100)).await;
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_timed_out_request_is_logged_with_its_408() {
    let (base_url, sink) = spawn_app_with(AppConfig {
        server: ServerConfig {
            timeout_seconds: 1,
            ..ServerConfig::default()
        },
        logging: default_logging(),
        ..AppConfig::default()
    })
    .await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/v1/delay?ms=1500", base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 408);
    resp.bytes().await.unwrap();

    wait_for_records(&sink, 1).await;
    sleep(Duration::from_millis(50)).await;
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, Severity::Warn);
    assert_eq!(records[0].1.response.status_code, 408);
    assert_eq!(records[0].1.request.path, "/api/v1/delay");
}
