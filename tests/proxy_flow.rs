//! End-to-end invocation tests against loopback backends.

use axum::routing::{any, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

use lt_lambda_adapter::adapter::AdapterError;
use lt_lambda_adapter::assets::AssetProvisioner;
use lt_lambda_adapter::backend::LoopbackServer;
use lt_lambda_adapter::config::AssetConfig;
use lt_lambda_adapter::http::InvocationEvent;
use lt_lambda_adapter::supervisor::{Preparation, ServerState, StartupError, SupervisorTimeouts};

mod common;

fn event(value: Value) -> InvocationEvent {
    serde_json::from_value(value).unwrap()
}

fn translate_event() -> InvocationEvent {
    event(json!({
        "rawPath": "/translate",
        "rawQueryString": "",
        "requestContext": {"http": {"method": "POST"}},
        "body": "{\"q\":\"hi\"}",
        "isBase64Encoded": false
    }))
}

fn translate_app() -> Router {
    Router::new().route(
        "/translate",
        post(|body: String| async move {
            // No content-type on the event, so parse by hand.
            let body: Value = serde_json::from_str(&body).unwrap();
            assert_eq!(body["q"], "hi");
            Json(json!({"translatedText": "bonjour"}))
        }),
    )
}

#[tokio::test]
async fn test_translate_through_supervised_backend() {
    let server = LoopbackServer::new("127.0.0.1", common::free_port().await);
    let launcher = common::InProcessLauncher::new(translate_app(), Duration::from_millis(100));
    let adapter = common::loopback_adapter(server, launcher, common::fast_timeouts(), None);

    let response = adapter.handle(&translate_event()).await.unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, r#"{"translatedText":"bonjour"}"#);
    assert!(!response.is_base64_encoded);
    assert_eq!(response.headers["content-type"], "application/json");
    assert_eq!(adapter.supervisor().unwrap().state(), ServerState::Ready);
    adapter.shutdown();
}

#[tokio::test]
async fn test_concurrent_invocations_share_one_launch() {
    let server = LoopbackServer::new("127.0.0.1", common::free_port().await);
    let launcher = common::InProcessLauncher::new(translate_app(), Duration::from_millis(300));
    let launches = launcher.launches.clone();
    let adapter = Arc::new(common::loopback_adapter(
        server,
        launcher,
        common::fast_timeouts(),
        None,
    ));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let adapter = adapter.clone();
        handles.push(tokio::spawn(async move { adapter.handle(&translate_event()).await }));
    }

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, r#"{"translatedText":"bonjour"}"#);
    }
    assert_eq!(launches.load(Ordering::SeqCst), 1);
    assert_eq!(adapter.supervisor().unwrap().launch_count(), 1);
    adapter.shutdown();
}

#[tokio::test]
async fn test_backend_that_never_listens_fails_terminally() {
    let server = LoopbackServer::new("127.0.0.1", common::free_port().await);
    let launcher = common::SilentLauncher::new();
    let launches = launcher.launches.clone();
    let timeouts = SupervisorTimeouts {
        probe_interval: Duration::from_millis(20),
        launch: Duration::from_millis(300),
        ready_wait: Duration::from_secs(5),
    };
    let adapter = common::loopback_adapter(server, launcher, timeouts, None);

    let first = adapter.handle(&translate_event()).await.unwrap_err();
    let cause = match &first {
        AdapterError::Startup(cause @ StartupError::NotReady { .. }) => cause.clone(),
        other => panic!("unexpected error {:?}", other),
    };
    assert_eq!(first.error_type(), "StartupError");

    let started = Instant::now();
    let second = adapter.handle(&translate_event()).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_millis(100));
    match second {
        AdapterError::Startup(again) => assert_eq!(again, cause),
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(launches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_invocations_share_one_failure() {
    let server = LoopbackServer::new("127.0.0.1", common::free_port().await);
    let launcher = common::SilentLauncher::new();
    let launches = launcher.launches.clone();
    let timeouts = SupervisorTimeouts {
        probe_interval: Duration::from_millis(20),
        launch: Duration::from_millis(300),
        ready_wait: Duration::from_secs(5),
    };
    let adapter = Arc::new(common::loopback_adapter(server, launcher, timeouts, None));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let adapter = adapter.clone();
        handles.push(tokio::spawn(async move { adapter.handle(&translate_event()).await }));
    }

    let mut causes = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Err(AdapterError::Startup(cause)) => causes.push(cause),
            other => panic!("unexpected result {:?}", other),
        }
    }
    assert!(matches!(causes[0], StartupError::NotReady { .. }));
    assert!(causes[0].to_string().ends_with("within 300ms"));
    assert!(causes.iter().all(|cause| *cause == causes[0]));
    assert_eq!(launches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_both_event_shapes_reach_backend_identically() {
    let echo = Router::new().route(
        "/{*path}",
        any(|request: axum::extract::Request| async move {
            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
            let mut headers: Vec<(String, String)> = parts
                .headers
                .iter()
                .filter(|(name, _)| name.as_str().starts_with("x-"))
                .map(|(name, value)| (name.to_string(), value.to_str().unwrap().to_string()))
                .collect();
            headers.sort();
            Json(json!({
                "method": parts.method.as_str(),
                "uri": parts.uri.to_string(),
                "headers": headers,
                "body": String::from_utf8_lossy(&body),
            }))
        }),
    );
    let server = LoopbackServer::new("127.0.0.1", common::free_port().await);
    let launcher = common::InProcessLauncher::new(echo, Duration::ZERO);
    let adapter = common::loopback_adapter(server, launcher, common::fast_timeouts(), None);

    let shape_a = event(json!({
        "version": "2.0",
        "rawPath": "/translate",
        "rawQueryString": "source=en&target=fr",
        "headers": {"x-api-key": "k1", "host": "example.com"},
        "requestContext": {"http": {"method": "POST"}},
        "body": "hello world",
        "isBase64Encoded": false
    }));
    let shape_b = event(json!({
        "path": "/translate",
        "httpMethod": "POST",
        "queryStringParameters": {"target": "fr", "source": "en"},
        "headers": {"x-api-key": "k1", "host": "example.com"},
        "body": STANDARD.encode("hello world"),
        "isBase64Encoded": true
    }));

    let a = adapter.handle(&shape_a).await.unwrap();
    let b = adapter.handle(&shape_b).await.unwrap();
    assert_eq!(a.status_code, b.status_code);
    assert_eq!(a.body, b.body);

    let echoed: Value = serde_json::from_str(&a.body).unwrap();
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["uri"], "/translate?source=en&target=fr");
    assert_eq!(echoed["body"], "hello world");
    assert_eq!(echoed["headers"], json!([["x-api-key", "k1"]]));
    adapter.shutdown();
}

#[tokio::test]
async fn test_binary_body_round_trips_as_base64() {
    let payload: Vec<u8> = vec![0x89, b'P', b'N', b'G', 0x00, 0xff, 0xfe, 0x10];
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let served = payload.clone();
    common::start_programmable_backend(listener, move || {
        let body = served.clone();
        async move { (200, vec![("Content-Type".to_string(), "image/png".to_string())], body) }
    })
    .await;

    // The backend is already up; the launcher only satisfies the gate.
    let adapter = common::loopback_adapter(
        LoopbackServer::new("127.0.0.1", port),
        common::SilentLauncher::new(),
        common::fast_timeouts(),
        None,
    );

    let response = adapter
        .handle(&event(json!({"rawPath": "/frontend/logo.png"})))
        .await
        .unwrap();
    assert_eq!(response.status_code, 200);
    assert!(response.is_base64_encoded);
    assert_eq!(STANDARD.decode(&response.body).unwrap(), payload);
    assert_eq!(response.headers["content-type"], "image/png");
}

#[tokio::test]
async fn test_non_2xx_passes_through() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    common::start_programmable_backend(listener, || async {
        (404, Vec::new(), br#"{"error":"not found"}"#.to_vec())
    })
    .await;
    let adapter = common::loopback_adapter(
        LoopbackServer::new("127.0.0.1", port),
        common::SilentLauncher::new(),
        common::fast_timeouts(),
        None,
    );

    let response = adapter.handle(&event(json!({"rawPath": "/missing"}))).await.unwrap();
    assert_eq!(response.status_code, 404);
    assert_eq!(response.body, r#"{"error":"not found"}"#);
}

#[tokio::test]
async fn test_dropped_connection_becomes_502() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    common::start_hangup_backend(listener).await;
    let adapter = common::loopback_adapter(
        LoopbackServer::new("127.0.0.1", port),
        common::SilentLauncher::new(),
        common::fast_timeouts(),
        None,
    );

    let response = adapter.handle(&translate_event()).await.unwrap();
    assert_eq!(response.status_code, 502);
    assert!(response.body.starts_with("Upstream proxy error:"));
    assert!(!response.is_base64_encoded);
}

#[tokio::test]
async fn test_missing_assets_do_not_block_startup() {
    let root = tempfile::tempdir().unwrap();
    let assets = AssetConfig {
        mount_path: root.path().join("mnt/models"),
        local_dir: root.path().join("tmp/models"),
        ..AssetConfig::default()
    };
    std::fs::create_dir_all(&assets.mount_path).unwrap();
    let provisioner = Arc::new(AssetProvisioner::new(assets.clone(), None));
    assert!(!provisioner.ensure_assets(&assets.mount_path).await);

    let server = LoopbackServer::new("127.0.0.1", common::free_port().await);
    let launcher = common::InProcessLauncher::new(translate_app(), Duration::ZERO);
    let launches = launcher.launches.clone();
    let adapter = common::loopback_adapter(
        server,
        launcher,
        common::fast_timeouts(),
        Some(provisioner as Arc<dyn Preparation>),
    );

    let response = adapter.handle(&translate_event()).await.unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(launches.load(Ordering::SeqCst), 1);
    adapter.shutdown();
}
