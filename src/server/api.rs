use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::models::TaskRequest;
use crate::pipeline::PipelineRunner;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    /// Value every inbound `secret` field must match.
    pub shared_secret: String,
    pub runner: Arc<PipelineRunner>,
}

pub type SharedState = Arc<AppState>;

// ── Error type ────────────────────────────────────────────────────────

pub enum ApiError {
    Forbidden(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/", get(service_status))
        .route("/health", get(health_check))
        .route("/api/deploy", post(deploy))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn service_status() -> Json<Value> {
    Json(json!({
        "status": "launchpad is running",
        "using": "AIPipe API",
        "supported_rounds": [1, 2],
        "round_1": "Creates new repository with app",
        "round_2": "Updates existing repository with new features",
    }))
}

async fn health_check() -> &'static str {
    "ok"
}

/// Accept a task, start its background run and answer immediately.
///
/// The secret is checked on the raw JSON before the request shape. Any body
/// that does not decode is a 500.
async fn deploy(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let value: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Internal(format!("Malformed request body: {}", e)))?;

    let secret = value.get("secret").and_then(Value::as_str);
    if secret != Some(state.shared_secret.as_str()) {
        warn!("Rejected deploy request with invalid secret");
        return Err(ApiError::Forbidden("Invalid secret".to_string()));
    }

    let request: TaskRequest = serde_json::from_value(value)
        .map_err(|e| ApiError::Internal(format!("Malformed request body: {}", e)))?;

    info!(task = %request.task, round = request.round, "Accepted deploy request");
    state.runner.spawn(request);

    Ok(Json(json!({"message": "Request received and processing"})))
}
