//! Load a stored clip, enhance it off the async runtime, store the result

use super::enhancer::{AudioEnhancer, Enhancement, EnhancementKind, Outcome};
use super::file_store::{AudioKind, FileStore, StoreError, StoredAudioFile};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnhancementError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of enhancing a stored clip
#[derive(Debug, Clone)]
pub struct EnhancedFile {
    pub source_identifier: String,
    pub stored: StoredAudioFile,
    pub outcome: Outcome,
}

pub struct EnhancementService {
    store: Arc<FileStore>,
    enhancer: Arc<AudioEnhancer>,
}

fn stored_kind(kind: EnhancementKind) -> AudioKind {
    match kind {
        EnhancementKind::Harmonize => AudioKind::Harmonized,
        EnhancementKind::Reharmonize => AudioKind::Reharmonized,
    }
}

impl EnhancementService {
    pub fn new(store: Arc<FileStore>, enhancer: Arc<AudioEnhancer>) -> Self {
        Self { store, enhancer }
    }

    /// Enhance `identifier`. `duration_seconds` defaults to the clip length.
    pub async fn enhance(
        &self,
        identifier: &str,
        kind: EnhancementKind,
        duration_seconds: Option<f64>,
    ) -> Result<EnhancedFile, EnhancementError> {
        let waveform = Arc::new(self.store.load(identifier).await?);
        let duration = duration_seconds.unwrap_or_else(|| waveform.duration_seconds());

        let enhancer = Arc::clone(&self.enhancer);
        let source = Arc::clone(&waveform);
        let enhancement = match tokio::task::spawn_blocking(move || enhancer.enhance(kind, &source, duration)).await {
            Ok(enhancement) => enhancement,
            Err(e) => {
                tracing::error!(kind = %kind, error = %e, "Enhancement task aborted, keeping original audio");
                Enhancement {
                    waveform: Arc::try_unwrap(waveform).unwrap_or_else(|w| (*w).clone()),
                    outcome: Outcome::FellBack {
                        reason: format!("enhancement task aborted: {}", e),
                    },
                }
            }
        };

        let stored = self.store.save(&enhancement.waveform, stored_kind(kind)).await?;
        tracing::info!(
            source = identifier,
            identifier = %stored.identifier,
            kind = %kind,
            applied = enhancement.outcome.is_applied(),
            "Enhanced file stored"
        );

        Ok(EnhancedFile {
            source_identifier: identifier.to_string(),
            stored,
            outcome: enhancement.outcome,
        })
    }
}
