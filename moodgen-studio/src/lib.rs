//! moodgen-studio library interface
//!
//! Exposes the router, services and DSP for the binary and integration tests.

pub mod api;
pub mod dsp;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use services::{
    AudioEnhancer, EnhancementService, FileStore, GenerationOrchestrator, ModelGate, MoodClassifier,
};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FileStore>,
    pub orchestrator: Arc<GenerationOrchestrator>,
    pub enhancement: Arc<EnhancementService>,
    pub model_gate: Arc<ModelGate>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last internal error, reported by `/health`
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        store: Arc<FileStore>,
        classifier: Arc<dyn MoodClassifier>,
        model_gate: Arc<ModelGate>,
        enhancer: AudioEnhancer,
    ) -> Self {
        let orchestrator = Arc::new(GenerationOrchestrator::new(
            classifier,
            Arc::clone(&model_gate),
            Arc::clone(&store),
        ));
        let enhancement = Arc::new(EnhancementService::new(Arc::clone(&store), Arc::new(enhancer)));

        Self {
            store,
            orchestrator,
            enhancement,
            model_gate,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember a server-side failure for `/health`
    pub async fn record_error(&self, err: &ApiError) {
        if err.is_internal() {
            *self.last_error.write().await = Some(err.to_string());
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::ui_routes())
        .merge(api::generate_routes())
        .merge(api::enhance_routes())
        .merge(api::file_routes())
        .merge(api::health_routes())
        .with_state(state)
}
