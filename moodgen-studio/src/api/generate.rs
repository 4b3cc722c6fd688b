//! POST /generate

use super::{audio_url, download_url, json_body, recorded, required_field};
use crate::services::{Classification, GenerationOutcome};
use crate::{ApiResult, AppState};
use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

/// Clip length used when the request omits `duration`
pub const DEFAULT_DURATION_SECONDS: f64 = 20.0;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    /// Requested clip length in seconds
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub filename: String,
    pub audio_url: String,
    pub download_url: String,
    pub message: String,
    pub classification: Classification,
    pub requested_duration: f64,
    pub effective_duration: f64,
    pub max_new_tokens: u32,
}

impl From<GenerationOutcome> for GenerateResponse {
    fn from(outcome: GenerationOutcome) -> Self {
        let filename = outcome.stored.identifier;
        Self {
            success: true,
            audio_url: audio_url(&filename),
            download_url: download_url(&filename),
            filename,
            message: "Music generated successfully!".to_string(),
            classification: outcome.classification,
            requested_duration: outcome.requested_duration,
            effective_duration: outcome.effective_duration,
            max_new_tokens: outcome.max_new_tokens,
        }
    }
}

/// POST /generate
///
/// Classifies the prompt, generates a clip and stores it.
pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<Json<GenerateResponse>> {
    let result = run_generate(&state, payload).await;
    recorded(&state, result).await
}

async fn run_generate(
    state: &AppState,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<Json<GenerateResponse>> {
    let request = json_body(payload)?;
    let prompt = required_field(request.prompt, "No prompt provided")?;
    let duration = request.duration.unwrap_or(DEFAULT_DURATION_SECONDS);

    tracing::info!(duration, prompt_chars = prompt.len(), "Generate request");
    let outcome = state.orchestrator.generate(&prompt, duration).await?;
    Ok(Json(outcome.into()))
}

pub fn generate_routes() -> Router<AppState> {
    Router::new().route("/generate", post(generate))
}
