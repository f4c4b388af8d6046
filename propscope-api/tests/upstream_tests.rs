//! Outbound HTTP tests: workflow webhook and floorplan CSV proxy
//!
//! Upstreams are local axum servers on ephemeral ports.

mod helpers;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use helpers::{spawn_mock, test_config, unreachable_url, RecordedRequests, TestApp};
use http_body_util::BodyExt;
use serde_json::{json, Value};

const PROPERTY_URL: &str = "https://example.com/p/1";

fn live_app(webhook_url: String) -> TestApp {
    let mut config = test_config();
    config.test_mode = false;
    config.workflow_webhook_url = Some(webhook_url);
    TestApp::with_config(config)
}

async fn recording_webhook(status: StatusCode) -> (String, RecordedRequests) {
    let recorded = RecordedRequests::default();
    let router = Router::new()
        .route(
            "/webhook",
            post(
                move |State(recorded): State<RecordedRequests>, Json(body): Json<Value>| async move {
                    recorded.push(body);
                    (status, Json(json!({"accepted": status.is_success()})))
                },
            ),
        )
        .with_state(recorded.clone());
    let base = spawn_mock(router).await;
    (format!("{}/webhook", base), recorded)
}

async fn csv_host() -> String {
    let router = Router::new()
        .route("/rooms.csv", get(|| async { "Room,Area\nKitchen,12\n" }))
        .route("/missing.csv", get(|| async { (StatusCode::NOT_FOUND, "no such file") }));
    spawn_mock(router).await
}

// =============================================================================
// Workflow webhook
// =============================================================================

/// TC-UP-001: Trigger posts the property and callback URLs to the webhook
#[tokio::test]
async fn tc_up_001_trigger_calls_webhook() {
    let (webhook, recorded) = recording_webhook(StatusCode::OK).await;
    let app = live_app(webhook);

    let (status, body) = app.post("/api/trigger", json!({"property_url": PROPERTY_URL})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Analysis triggered successfully");

    assert_eq!(
        recorded.all(),
        vec![json!({
            "property_url": PROPERTY_URL,
            "workflow_callback_url": "http://propscope.test/api/callback"
        })]
    );
}

/// TC-UP-002: Webhook failure status surfaces as an upstream error
#[tokio::test]
async fn tc_up_002_webhook_error_status() {
    let (webhook, recorded) = recording_webhook(StatusCode::INTERNAL_SERVER_ERROR).await;
    let app = live_app(webhook);

    let (status, body) = app.post("/api/trigger", json!({"property_url": PROPERTY_URL})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");
    assert_eq!(recorded.all().len(), 1);
}

/// TC-UP-003: Unreachable webhook surfaces as an upstream error
#[tokio::test]
async fn tc_up_003_webhook_unreachable() {
    let app = live_app(format!("{}/webhook", unreachable_url().await));

    let (status, body) = app.post("/api/trigger", json!({"property_url": PROPERTY_URL})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");
}

/// TC-UP-004: Trigger outside test mode without a webhook is an upstream error
#[tokio::test]
async fn tc_up_004_webhook_not_configured() {
    let mut config = test_config();
    config.test_mode = false;
    let app = TestApp::with_config(config);

    let (status, body) = app.post("/api/trigger", json!({"property_url": PROPERTY_URL})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "UPSTREAM_ERROR");
}

/// TC-UP-005: A plain-text webhook reply still counts as a successful trigger
#[tokio::test]
async fn tc_up_005_webhook_text_reply() {
    let router = Router::new().route("/webhook", post(|| async { "Workflow was started" }));
    let app = live_app(format!("{}/webhook", spawn_mock(router).await));

    let (status, body) = app.post("/api/trigger", json!({"property_url": PROPERTY_URL})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

// =============================================================================
// CSV proxy
// =============================================================================

/// TC-UP-010: Proxied CSV is returned as plain text readable from any origin
#[tokio::test]
async fn tc_up_010_csv_proxy_success() {
    let host = csv_host().await;
    let app = TestApp::new();

    let request = Request::builder()
        .uri(format!("/api/floorplan-csv?url={}/rooms.csv", host))
        .header("origin", "http://elsewhere.test")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/plain; charset=utf-8");
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"Room,Area\nKitchen,12\n");
}

/// TC-UP-011: The legacy proxy path serves the same content
#[tokio::test]
async fn tc_up_011_csv_proxy_alias() {
    let host = csv_host().await;
    let app = TestApp::new();

    let (status, body) = app.get(&format!("/api/proxy-csv?url={}/rooms.csv", host)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("Room,Area\nKitchen,12\n".to_string()));
}

/// TC-UP-012: Upstream non-success becomes a bad gateway
#[tokio::test]
async fn tc_up_012_csv_upstream_not_found() {
    let host = csv_host().await;
    let app = TestApp::new();

    let (status, body) = app.get(&format!("/api/floorplan-csv?url={}/missing.csv", host)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["message"], "Failed to fetch CSV from upstream (404)");
}

/// TC-UP-013: Missing or invalid url parameter is a bad request
#[tokio::test]
async fn tc_up_013_csv_bad_url() {
    let app = TestApp::new();

    let (status, _) = app.get("/api/floorplan-csv").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/floorplan-csv?url=ftp://example.com/rooms.csv").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// TC-UP-014: Network failure reaching the CSV host is an internal error
#[tokio::test]
async fn tc_up_014_csv_unreachable() {
    let host = unreachable_url().await;
    let app = TestApp::new();

    let (status, body) = app.get(&format!("/api/floorplan-csv?url={}/rooms.csv", host)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
}
