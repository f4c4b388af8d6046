//! Dashboard page and static assets
//!
//! Embeds the HTML/CSS/JS at compile time.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};

use crate::AppState;

const INDEX_HTML: &str = include_str!("../../static/index.html");
const DASHBOARD_JS: &str = include_str!("../../static/dashboard.js");
const DASHBOARD_CSS: &str = include_str!("../../static/dashboard.css");

/// Build UI routes
pub fn ui_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard_page))
        .route("/static/dashboard.js", get(serve_dashboard_js))
        .route("/static/dashboard.css", get(serve_dashboard_css))
}

/// GET /
async fn dashboard_page() -> impl IntoResponse {
    Html(INDEX_HTML)
}

/// GET /static/dashboard.js
pub async fn serve_dashboard_js() -> Response {
    (
        StatusCode::OK,
        [
            ("content-type", "application/javascript"),
            ("cache-control", "no-cache, no-store, must-revalidate"),
        ],
        DASHBOARD_JS,
    )
        .into_response()
}

/// GET /static/dashboard.css
pub async fn serve_dashboard_css() -> Response {
    (
        StatusCode::OK,
        [
            ("content-type", "text/css"),
            ("cache-control", "no-cache, no-store, must-revalidate"),
        ],
        DASHBOARD_CSS,
    )
        .into_response()
}
