//! propscope-api - Property analysis relay service
//!
//! Relays dashboard requests to the external analysis workflow, receives
//! its callbacks, keeps the latest results in memory and pushes completion
//! notices to waiting browser connections over SSE.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use propscope_common::config::{resolve_config_path, ConfigOverrides, ServiceConfig};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use propscope_api::AppState;

/// Command-line arguments for propscope-api
#[derive(Parser, Debug)]
#[command(name = "propscope-api")]
#[command(about = "Property analysis relay service")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "PROPSCOPE_CONFIG")]
    config: Option<PathBuf>,

    /// Socket address to listen on
    #[arg(short, long, env = "PROPSCOPE_BIND")]
    bind: Option<String>,

    /// Externally reachable base URL for workflow callbacks
    #[arg(long, env = "PUBLIC_BASE_URL")]
    public_base_url: Option<String>,

    /// Workflow engine webhook URL
    #[arg(long, env = "PROPSCOPE_WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Do not call the workflow webhook on trigger
    #[arg(long, env = "TEST_MODE")]
    test_mode: bool,

    /// Enable development-only routes
    #[arg(long, env = "PROPSCOPE_DEV_ROUTES")]
    dev_routes: bool,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, env = "PROPSCOPE_LOG")]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        // Unset flags leave the file value in place
        ConfigOverrides {
            bind_addr: self.bind.clone(),
            public_base_url: self.public_base_url.clone(),
            workflow_webhook_url: self.webhook_url.clone(),
            test_mode: self.test_mode.then_some(true),
            dev_routes: self.dev_routes.then_some(true),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let config = ServiceConfig::load(config_path.as_deref(), args.overrides())
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting propscope-api v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Build: {} ({}, {})",
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file, using defaults"),
    }
    info!("Callback URL: {}", config.callback_url());

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config).context("Failed to initialize application state")?;
    if state.config.test_mode {
        info!("TEST_MODE enabled: triggers will not call the workflow webhook");
    } else if !state.workflow.is_configured() {
        warn!("workflow_webhook_url not configured; /api/trigger will fail until it is set");
    }
    let app = propscope_api::build_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    info!("Listening on http://{}", bind_addr);
    info!("Health check: http://{}/health", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
