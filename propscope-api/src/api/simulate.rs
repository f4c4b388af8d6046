//! Development-only callback simulation
//!
//! Feeds a payload through the same validate/normalize/store/notify path
//! as the real callback, without involving the workflow engine. Only
//! mounted when `dev_routes` is enabled.

use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use chrono::Utc;
use propscope_common::normalize::Envelope;
use serde_json::Value;
use tracing::info;

use super::callback::{handle_complete, handle_started, CallbackResponse};
use crate::error::{ApiError, ApiResult};
use crate::validation::CallbackKind;
use crate::AppState;

/// Payload used when the request body is empty
pub const SAMPLE_CALLBACK: &str = include_str!("../../../propscope-common/fixtures/sample_callback.json");

fn is_blank(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// POST /api/test/simulate-callback
///
/// A payload without a `status` is treated as a complete callback.
pub async fn simulate_callback(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<CallbackResponse>> {
    let mut raw: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?
    };

    if is_blank(&raw) {
        info!("Simulating callback with the bundled sample payload");
        raw = serde_json::from_str(SAMPLE_CALLBACK)
            .map_err(|e| ApiError::Internal(format!("Sample payload is not valid JSON: {}", e)))?;
    } else {
        info!("Simulating callback with the provided payload");
    }

    let payload = Envelope::detect(&raw).payload();
    let kind = match CallbackKind::from_payload(payload) {
        Ok(kind) => kind,
        Err(None) => CallbackKind::Complete,
        Err(Some(status)) => {
            return Err(ApiError::BadRequest(format!(
                "Invalid callback status: must be either 'started' or 'complete', received: {}",
                status
            )))
        }
    };

    let received_at = Utc::now();
    match kind {
        CallbackKind::Started => handle_started(&state, payload, received_at).await,
        CallbackKind::Complete => handle_complete(&state, payload, received_at).await,
    }
}

pub fn simulate_routes() -> Router<AppState> {
    Router::new().route("/test/simulate-callback", post(simulate_callback))
}
