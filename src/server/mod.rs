//! Webhook front door.
//!
//! `POST /api/deploy` checks the shared secret, hands the task to a detached
//! pipeline run and answers straight away. `GET /` and `GET /health` report
//! liveness.

pub mod api;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Settings;
use crate::pipeline::PipelineRunner;
use api::{AppState, SharedState};

/// Build the full application router with access logging.
pub fn build_router(state: SharedState) -> Router {
    api::api_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the webhook server and block until Ctrl+C.
pub async fn start_server(settings: Settings) -> Result<()> {
    let runner =
        PipelineRunner::from_settings(&settings).context("Failed to initialize pipeline")?;
    let state = Arc::new(AppState {
        shared_secret: settings.secrets.shared_secret.clone(),
        runner: Arc::new(runner),
    });
    let app = build_router(state);

    let addr = settings.server.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!("launchpad listening on http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Shutting down, in-flight runs are dropped");
}
