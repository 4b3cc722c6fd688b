//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::services::ModelState;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the music model failed to load
    pub status: String,
    /// Module name ("moodgen-studio")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// "loading", "ready" or "failed"
    pub model_state: String,
    /// Last error message if any (for diagnostics)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let model_state = state.model_gate.state();
    let mut last_error = state.last_error.read().await.clone();
    let status = match &model_state {
        ModelState::Failed(reason) => {
            last_error.get_or_insert_with(|| format!("Music model failed to load: {}", reason));
            "degraded"
        }
        _ => "ok",
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "moodgen-studio".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        model_state: model_state.label().to_string(),
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
