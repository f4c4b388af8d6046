//! Same-origin proxy for floorplan CSV files
//!
//! The dashboard cannot fetch CSVs from the analysis CDN directly because
//! of browser cross-origin rules, so it fetches them through here.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::validation::validate_http_url;
use crate::AppState;

/// Upstream error bodies are logged up to this many characters
const ERROR_SNIPPET_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
pub struct CsvQuery {
    pub url: Option<String>,
}

/// GET /api/floorplan-csv?url=
pub async fn proxy_csv(
    State(state): State<AppState>,
    Query(query): Query<CsvQuery>,
) -> ApiResult<Response> {
    let raw_url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("url query parameter required".to_string()))?;
    let url = validate_http_url("url", &raw_url).map_err(|e| ApiError::BadRequest(e.message))?;

    info!("CSV proxy: fetching {}", url);
    let response = state.http_client.get(url).send().await.map_err(|e| {
        error!("CSV proxy: request failed: {}", e);
        ApiError::Internal(format!("Failed to fetch CSV: {}", e))
    })?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let snippet: String = text.chars().take(ERROR_SNIPPET_CHARS).collect();
        warn!("CSV proxy: upstream returned {}: {}", status, snippet);
        return Err(ApiError::BadGateway(format!(
            "Failed to fetch CSV from upstream ({})",
            status.as_u16()
        )));
    }

    let csv = response.text().await.map_err(|e| {
        error!("CSV proxy: reading body failed: {}", e);
        ApiError::Internal(format!("Failed to read CSV: {}", e))
    })?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        csv,
    )
        .into_response())
}

/// Build CSV proxy routes; responses may be read from any origin
pub fn floorplan_routes() -> Router<AppState> {
    Router::new()
        .route("/floorplan-csv", get(proxy_csv))
        .route("/proxy-csv", get(proxy_csv))
        .layer(CorsLayer::new().allow_origin(Any))
}
