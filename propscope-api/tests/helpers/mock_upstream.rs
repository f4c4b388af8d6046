//! Local HTTP server standing in for external services

use std::sync::{Arc, Mutex};

use axum::Router;
use serde_json::Value;

/// JSON bodies received by a mock endpoint
#[derive(Clone, Default)]
pub struct RecordedRequests(Arc<Mutex<Vec<Value>>>);

impl RecordedRequests {
    pub fn push(&self, body: Value) {
        self.0.lock().unwrap().push(body);
    }

    pub fn all(&self) -> Vec<Value> {
        self.0.lock().unwrap().clone()
    }
}

/// Serve `router` on an ephemeral local port; returns its base URL
pub async fn spawn_mock(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A local URL nothing is listening on
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
