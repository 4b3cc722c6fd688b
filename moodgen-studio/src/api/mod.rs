//! HTTP API handlers for moodgen-studio

pub mod enhance;
pub mod files;
pub mod generate;
pub mod health;
pub mod ui;

pub use enhance::enhance_routes;
pub use files::file_routes;
pub use generate::generate_routes;
pub use health::health_routes;
pub use ui::ui_routes;

use crate::{ApiError, ApiResult, AppState};
use axum::extract::rejection::JsonRejection;
use axum::Json;

/// Unwrap a JSON body, turning malformed input into a 400
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// Required, non-blank string field
pub(crate) fn required_field(value: Option<String>, message: &str) -> ApiResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ApiError::BadRequest(message.to_string())),
    }
}

/// Record server-side failures in `last_error` before returning them
pub(crate) async fn recorded<T>(state: &AppState, result: ApiResult<T>) -> ApiResult<T> {
    if let Err(err) = &result {
        state.record_error(err).await;
    }
    result
}

/// Playback URL for a stored file
pub fn audio_url(identifier: &str) -> String {
    format!("/audio/{}", identifier)
}

/// Download URL for a stored file
pub fn download_url(identifier: &str) -> String {
    format!("/download/{}", identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_field() {
        assert_eq!(required_field(Some("  calm piano ".into()), "missing").unwrap(), "calm piano");
        assert!(matches!(required_field(Some("   ".into()), "missing"), Err(ApiError::BadRequest(_))));
        assert!(matches!(required_field(None, "missing"), Err(ApiError::BadRequest(m)) if m == "missing"));
    }

    #[test]
    fn test_urls() {
        assert_eq!(audio_url("generated_0a1b2c3d.wav"), "/audio/generated_0a1b2c3d.wav");
        assert_eq!(download_url("generated_0a1b2c3d.wav"), "/download/generated_0a1b2c3d.wav");
    }
}
