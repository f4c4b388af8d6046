//! # propscope common library
//!
//! Shared code for the propscope service and its tests:
//! - Analysis record model (`NormalizedResult` and friends)
//! - Normalizer for upstream workflow payloads
//! - Live-update event types sent over SSE
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod normalize;

pub use error::{Error, Result};
pub use events::StreamEvent;
pub use model::{AnalysisKey, AnalysisStatus, FloorplanRefs, NormalizedResult, Snapshot};
pub use normalize::normalize;
