//! Analysis trigger endpoint
//!
//! Relays the property URL to the workflow engine along with the callback
//! URL it should report back to.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::validation::validate_trigger;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub message: String,
    /// Callback URL handed to the workflow engine
    pub workflow_callback_url: String,
}

/// POST /api/trigger
pub async fn trigger_analysis(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<TriggerResponse>> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let property_url = validate_trigger(&body).map_err(|details| ApiError::Validation {
        message: "Invalid request".to_string(),
        details,
    })?;

    let workflow_callback_url = state.config.callback_url();
    info!("Trigger for {} (callback {})", property_url, workflow_callback_url);

    if state.config.test_mode {
        info!("Test mode enabled, not calling the workflow webhook");
        return Ok(Json(TriggerResponse {
            success: true,
            message: "TEST_MODE: Use POST /api/test/simulate-callback to trigger 'started' and 'complete' callbacks".to_string(),
            workflow_callback_url,
        }));
    }

    let response = state
        .workflow
        .trigger(&property_url, &workflow_callback_url)
        .await?;
    info!("Workflow response for {}: {}", property_url, response);

    Ok(Json(TriggerResponse {
        success: true,
        message: "Analysis triggered successfully".to_string(),
        workflow_callback_url,
    }))
}

pub fn trigger_routes() -> Router<AppState> {
    Router::new().route("/trigger", post(trigger_analysis))
}
