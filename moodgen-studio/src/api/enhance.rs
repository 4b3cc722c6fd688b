//! POST /harmonize and POST /reharmonize

use super::{audio_url, download_url, json_body, recorded, required_field};
use crate::services::{EnhancedFile, EnhancementKind, Outcome};
use crate::{ApiResult, AppState};
use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct EnhanceRequest {
    /// Identifier of a stored clip
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct EnhanceResponse {
    pub success: bool,
    pub filename: String,
    pub source_filename: String,
    pub audio_url: String,
    pub download_url: String,
    /// `"applied"` or `"fallback"`
    pub enhancement: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub message: String,
}

impl EnhanceResponse {
    fn new(kind: EnhancementKind, file: EnhancedFile) -> Self {
        let filename = file.stored.identifier;
        let (enhancement, fallback_reason, message) = match file.outcome {
            Outcome::Applied => ("applied", None, format!("Audio {} successfully!", past_tense(kind))),
            Outcome::FellBack { reason } => (
                "fallback",
                Some(reason),
                format!("Could not {} audio; original kept", kind),
            ),
        };
        Self {
            success: true,
            audio_url: audio_url(&filename),
            download_url: download_url(&filename),
            filename,
            source_filename: file.source_identifier,
            enhancement,
            fallback_reason,
            message,
        }
    }
}

fn past_tense(kind: EnhancementKind) -> &'static str {
    match kind {
        EnhancementKind::Harmonize => "harmonized",
        EnhancementKind::Reharmonize => "reharmonized",
    }
}

async fn run_enhance(
    state: &AppState,
    kind: EnhancementKind,
    payload: Result<Json<EnhanceRequest>, JsonRejection>,
) -> ApiResult<Json<EnhanceResponse>> {
    let request = json_body(payload)?;
    let filename = required_field(request.filename, "No filename provided")?;

    tracing::info!(kind = %kind, filename = %filename, "Enhance request");
    let file = state.enhancement.enhance(&filename, kind, request.duration).await?;
    Ok(Json(EnhanceResponse::new(kind, file)))
}

/// POST /harmonize
pub async fn harmonize(
    State(state): State<AppState>,
    payload: Result<Json<EnhanceRequest>, JsonRejection>,
) -> ApiResult<Json<EnhanceResponse>> {
    let result = run_enhance(&state, EnhancementKind::Harmonize, payload).await;
    recorded(&state, result).await
}

/// POST /reharmonize
pub async fn reharmonize(
    State(state): State<AppState>,
    payload: Result<Json<EnhanceRequest>, JsonRejection>,
) -> ApiResult<Json<EnhanceResponse>> {
    let result = run_enhance(&state, EnhancementKind::Reharmonize, payload).await;
    recorded(&state, result).await
}

pub fn enhance_routes() -> Router<AppState> {
    Router::new()
        .route("/harmonize", post(harmonize))
        .route("/reharmonize", post(reharmonize))
}
