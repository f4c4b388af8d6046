//! In-process test application

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use propscope_common::config::ServiceConfig;
use serde_json::Value;
use tower::ServiceExt;

use propscope_api::{build_router, AppState};

/// Config for tests: test mode, dev routes, short stream timings
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        public_base_url: Some("http://propscope.test".to_string()),
        test_mode: true,
        dev_routes: true,
        stream_timeout_secs: 30,
        heartbeat_interval_secs: 1,
        upstream_timeout_secs: 5,
        ..Default::default()
    }
}

/// Router and the state it shares with every request
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        let state = AppState::new(config).expect("state builds");
        let router = build_router(state.clone());
        Self { router, state }
    }

    /// Send a request, returning the raw response
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.expect("router is infallible")
    }

    /// Send a request and decode the JSON body (`Value::Null` when empty)
    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        let response = self.send(request).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request("GET", uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(body)).await
    }

    /// Open a live-update stream for `property_url`
    pub async fn open_stream(&self, property_url: &str) -> SseReader {
        let uri = format!("/api/stream?property_url={}", urlencode(property_url));
        let response = self
            .send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::OK, "stream should open");
        SseReader::new(response.into_body())
    }
}

fn urlencode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect()
}

/// Reads an SSE body frame by frame
pub struct SseReader {
    body: Body,
    buffer: String,
    finished: bool,
}

impl SseReader {
    fn new(body: Body) -> Self {
        Self {
            body,
            buffer: String::new(),
            finished: false,
        }
    }

    /// Next complete SSE message (text up to a blank line), or `None` at end of stream
    pub async fn next_message(&mut self, wait: Duration) -> Option<String> {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let message = self.buffer[..end].to_string();
                self.buffer.drain(..end + 2);
                return Some(message);
            }
            if self.finished {
                return None;
            }
            match tokio::time::timeout(wait, self.body.frame()).await {
                Err(_) => panic!("no SSE data within {:?}; buffered: {:?}", wait, self.buffer),
                Ok(None) => self.finished = true,
                Ok(Some(frame)) => {
                    let frame = frame.expect("stream frame");
                    if let Ok(data) = frame.into_data() {
                        self.buffer.push_str(&String::from_utf8_lossy(&data));
                    }
                }
            }
        }
    }

    /// Next `data:` payload decoded as JSON, skipping comment frames
    pub async fn next_event(&mut self, wait: Duration) -> Option<Value> {
        while let Some(message) = self.next_message(wait).await {
            let data: Vec<&str> = message
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(str::trim_start)
                .collect();
            if !data.is_empty() {
                return Some(serde_json::from_str(&data.join("\n")).expect("JSON event"));
            }
        }
        None
    }

    /// True once the server closed the stream
    pub async fn is_closed(&mut self, wait: Duration) -> bool {
        self.next_message(wait).await.is_none()
    }
}
