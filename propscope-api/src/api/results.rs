//! Stored result lookups and history

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use propscope_common::model::HistorySummary;
use propscope_common::NormalizedResult;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ResultQuery {
    pub super_id: Option<String>,
    pub property_url: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// GET /api/results?super_id=|property_url=
///
/// `super_id` takes precedence when both are given.
pub async fn get_result(
    State(state): State<AppState>,
    Query(query): Query<ResultQuery>,
) -> ApiResult<Json<NormalizedResult>> {
    debug!("Result query: {:?}", query);
    let result = match (non_empty(query.super_id), non_empty(query.property_url)) {
        (Some(super_id), _) => state.store.get_result_by_super_id(&super_id).await,
        (None, Some(url)) => state.store.get_result_by_property_url(&url).await,
        (None, None) => {
            return Err(ApiError::BadRequest(
                "Either super_id or property_url query parameter required".to_string(),
            ))
        }
    };

    result
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Result not found".to_string()))
}

/// GET /api/data-view/:super_id
pub async fn data_view(
    State(state): State<AppState>,
    Path(super_id): Path<String>,
) -> ApiResult<Json<NormalizedResult>> {
    state
        .store
        .get_result_by_super_id(&super_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No result for super_id {}", super_id)))
}

/// GET /api/history
pub async fn history(State(state): State<AppState>) -> Json<Vec<HistorySummary>> {
    let results = state.store.get_all_results_chrono().await;
    Json(results.iter().map(NormalizedResult::summary).collect())
}

pub fn result_routes() -> Router<AppState> {
    Router::new()
        .route("/results", get(get_result))
        .route("/data-view/:super_id", get(data_view))
        .route("/history", get(history))
}
