//! Workflow callback endpoint
//!
//! The workflow engine calls back twice per analysis: `started` once it has
//! assigned a `super_id`, then `complete` with the full payload. Any
//! complete callback that cannot be accepted still leaves an `error` record
//! behind, so a waiting dashboard sees the failure instead of hanging.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use propscope_common::normalize::{key_fields, Envelope};
use propscope_common::{normalize, AnalysisStatus, NormalizedResult};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::store::StoreOutcome;
use crate::validation::{is_stringified_object, validate_callback_key, CallbackKind};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub success: bool,
    pub super_id: Option<String>,
    pub status: AnalysisStatus,
}

/// Store a record and wake the connections waiting on its property URL.
///
/// Non-terminal records only push the started event.
pub(crate) async fn commit(state: &AppState, record: NormalizedResult) -> StoreOutcome {
    let outcome = state.store.store_result(record).await;
    if let Some(stored) = outcome.stored() {
        if let Some(url) = stored.key.property_url.as_deref() {
            match (stored.analysis_status, stored.key.super_id.as_deref()) {
                (AnalysisStatus::Started, Some(super_id)) => {
                    state.registry.notify_started(url, super_id);
                }
                (status, super_id) if status.is_terminal() => {
                    state.registry.notify(url, super_id, status);
                }
                _ => {}
            }
        }
    }
    outcome
}

/// Record a failed analysis under whatever identity is known
async fn commit_error(
    state: &AppState,
    super_id: Option<String>,
    property_url: Option<String>,
    received_at: DateTime<Utc>,
) {
    let record = NormalizedResult::placeholder(super_id, property_url, AnalysisStatus::Error, received_at);
    if let StoreOutcome::Rejected { current, .. } = commit(state, record).await {
        warn!("Error record not stored, analysis already {}", current);
    }
}

fn accepted(outcome: StoreOutcome) -> ApiResult<Json<CallbackResponse>> {
    match outcome {
        StoreOutcome::Inserted(record) | StoreOutcome::Merged(record) => Ok(Json(CallbackResponse {
            success: true,
            super_id: record.key.super_id,
            status: record.analysis_status,
        })),
        StoreOutcome::Rejected { current, attempted } => Err(ApiError::Conflict(format!(
            "Analysis is already {}, cannot record {}",
            current, attempted
        ))),
    }
}

/// POST /api/callback
pub async fn analysis_callback(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<CallbackResponse>> {
    let Json(raw) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let payload = Envelope::detect(&raw).payload();
    let received_at = Utc::now();

    let kind = CallbackKind::from_payload(payload).map_err(|status| {
        let status = status.unwrap_or_else(|| "none".to_string());
        error!("Callback with unknown status: {}", status);
        ApiError::BadRequest(format!(
            "Invalid callback status: must be either 'started' or 'complete', received: {}",
            status
        ))
    })?;

    match kind {
        CallbackKind::Started => handle_started(&state, payload, received_at).await,
        CallbackKind::Complete => handle_complete(&state, payload, received_at).await,
    }
}

pub(crate) async fn handle_started(
    state: &AppState,
    payload: &Value,
    received_at: DateTime<Utc>,
) -> ApiResult<Json<CallbackResponse>> {
    let key = validate_callback_key(payload).map_err(|details| {
        warn!("Invalid started callback: {} field error(s)", details.len());
        ApiError::Validation {
            message: "Invalid 'started' callback payload".to_string(),
            details,
        }
    })?;
    info!("Started callback for super_id {}", key.super_id);

    let placeholder = NormalizedResult::placeholder(
        Some(key.super_id),
        Some(key.property_url),
        AnalysisStatus::Started,
        received_at,
    );
    accepted(commit(state, placeholder).await)
}

pub(crate) async fn handle_complete(
    state: &AppState,
    payload: &Value,
    received_at: DateTime<Utc>,
) -> ApiResult<Json<CallbackResponse>> {
    let key = match validate_callback_key(payload) {
        Ok(key) => key,
        Err(details) => {
            warn!("Invalid complete callback: {} field error(s)", details.len());
            if let (Some(super_id), Some(url)) = key_fields(payload) {
                commit_error(state, Some(super_id), Some(url), received_at).await;
            }
            return Err(ApiError::Validation {
                message: "Invalid 'complete' callback payload".to_string(),
                details,
            });
        }
    };
    info!("Complete callback for super_id {}", key.super_id);

    if let Some(existing) = state.store.get_result_by_super_id(&key.super_id).await {
        if let Some(existing_url) = existing.key.property_url {
            if existing_url != key.property_url {
                error!(
                    "Property URL mismatch for super_id {}: stored {}, received {}",
                    key.super_id, existing_url, key.property_url
                );
                // The error lands on the original URL, where the dashboard is waiting
                commit_error(state, Some(key.super_id.clone()), Some(existing_url), received_at).await;
                return Err(ApiError::BadRequest(format!(
                    "Property URL mismatch: the property_url for super_id {} does not match the previously stored value",
                    key.super_id
                )));
            }
        }
    }

    if is_stringified_object(payload) {
        error!("final_result for super_id {} arrived as '[object Object]'", key.super_id);
        commit_error(state, Some(key.super_id), Some(key.property_url), received_at).await;
        return Err(ApiError::BadRequest(
            "Invalid workflow payload format: 'final_result' was sent as the string '[object Object]'. \
             Send the body as JSON and pass the final_result object directly."
                .to_string(),
        ));
    }

    let mut normalized = normalize(payload, AnalysisStatus::Complete, received_at);
    if let Err(reason) = normalized.check_complete() {
        warn!(
            "Complete callback for super_id {} has no floorplan CSV: {:?}",
            key.super_id, normalized.floorplan
        );
        normalized.analysis_status = AnalysisStatus::Error;
        commit(state, normalized).await;
        return Err(ApiError::BadRequest(format!(
            "floorplan CSV missing: {}. Ensure the workflow sends the complete final_result.floorplan_data.",
            reason
        )));
    }

    accepted(commit(state, normalized).await)
}

/// Build callback routes
pub fn callback_routes() -> Router<AppState> {
    Router::new()
        .route("/callback", post(analysis_callback))
        .route("/analysis/callback", post(analysis_callback))
}
