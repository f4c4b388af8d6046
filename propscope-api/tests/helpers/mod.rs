//! Test helpers for propscope-api integration tests
//!
//! - TestApp: router plus shared state with request helpers
//! - SseReader: incremental reader for SSE response bodies
//! - MockUpstream: local axum server standing in for the workflow engine
//!   and the floorplan CSV host

#![allow(dead_code, unused_imports)]

pub mod mock_upstream;
pub mod test_app;

pub use mock_upstream::{spawn_mock, unreachable_url, RecordedRequests};
pub use test_app::{test_config, SseReader, TestApp};
