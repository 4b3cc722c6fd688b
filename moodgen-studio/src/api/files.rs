//! Stored audio playback and download

use super::recorded;
use crate::services::StoreError;
use crate::{ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

async fn read_stored(state: &AppState, filename: &str) -> ApiResult<Vec<u8>> {
    let result = match state.store.path_of(filename).await {
        Ok(path) => read_audio(&path, filename).await,
        Err(e) => Err(e.into()),
    };
    recorded(state, result).await
}

/// Read a cataloged file; one removed since lookup (retention sweep) is not found
async fn read_audio(path: &std::path::Path, filename: &str) -> ApiResult<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(StoreError::NotFound(filename.to_string()).into())
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /audio/:filename
///
/// Streams the WAV file for in-browser playback.
pub async fn serve_audio(State(state): State<AppState>, Path(filename): Path<String>) -> ApiResult<Response> {
    let bytes = read_stored(&state, &filename).await?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "audio/wav".to_string())], bytes).into_response())
}

/// GET /download/:filename
pub async fn download_audio(State(state): State<AppState>, Path(filename): Path<String>) -> ApiResult<Response> {
    let bytes = read_stored(&state, &filename).await?;
    // filename passed identifier validation in path_of
    let disposition = format!("attachment; filename=\"{}\"", filename);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/wav".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

pub fn file_routes() -> Router<AppState> {
    Router::new()
        .route("/audio/:filename", get(serve_audio))
        .route("/download/:filename", get(download_audio))
}
