//! propscope-api library interface
//!
//! Exposes the application state and router for the binary and for
//! integration tests.

pub mod api;
pub mod error;
pub mod registry;
pub mod store;
pub mod validation;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use propscope_common::config::ServiceConfig;
use std::sync::Arc;

use crate::registry::ClientRegistry;
use crate::store::ResultStore;
use crate::workflow::{WorkflowClient, WorkflowError};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    /// Latest result per analysis, plus history
    pub store: ResultStore,
    /// Open live-update connections
    pub registry: ClientRegistry,
    pub workflow: WorkflowClient,
    /// Outbound client for the CSV proxy
    pub http_client: reqwest::Client,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> Result<Self, WorkflowError> {
        let http_client = workflow::build_http_client(config.upstream_timeout())?;
        let workflow = WorkflowClient::new(http_client.clone(), config.workflow_webhook_url.clone());

        Ok(Self {
            store: ResultStore::new(config.history_capacity),
            registry: ClientRegistry::new(),
            workflow,
            http_client,
            startup_time: Utc::now(),
            config: Arc::new(config),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let mut api = Router::new()
        .merge(api::trigger_routes())
        .merge(api::callback_routes())
        .merge(api::stream_routes())
        .merge(api::result_routes())
        .merge(api::floorplan_routes());

    if state.config.dev_routes {
        tracing::info!("Development routes enabled: POST /api/test/simulate-callback");
        api = api.merge(api::simulate_routes());
    }

    Router::new()
        .merge(api::ui_routes())
        .merge(api::health_routes())
        .nest("/api", api)
        .with_state(state)
}
