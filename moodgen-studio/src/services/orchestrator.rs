//! Generation pipeline: classify, build prompt, generate, store

use super::classifier::{Classification, ClassifierError, MoodClassifier};
use super::file_store::{AudioKind, FileStore, StoreError, StoredAudioFile};
use super::generator::GeneratorError;
use super::model_gate::ModelGate;
use moodgen_common::{effective_duration_seconds, tokens_for_duration};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

/// Suffix appended to every generation prompt
const PROMPT_SUFFIX: &str = "Professional cinematic feel.";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Classification failed: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Generation failed: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Music model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Storing generated audio failed: {0}")]
    Storage(#[from] StoreError),
}

/// Result of one generation request
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub stored: StoredAudioFile,
    pub classification: Classification,
    pub prompt: String,
    pub requested_duration: f64,
    pub effective_duration: f64,
    pub max_new_tokens: u32,
}

/// `"{input}, {classification lowercased}. Professional cinematic feel."`
pub fn build_generation_prompt(user_input: &str, raw_classification: &str) -> String {
    format!(
        "{}, {}. {}",
        user_input,
        raw_classification.trim().to_lowercase(),
        PROMPT_SUFFIX
    )
}

pub struct GenerationOrchestrator {
    classifier: Arc<dyn MoodClassifier>,
    model_gate: Arc<ModelGate>,
    store: Arc<FileStore>,
    /// Serializes access to the generator
    generation_lock: Mutex<()>,
}

impl GenerationOrchestrator {
    pub fn new(classifier: Arc<dyn MoodClassifier>, model_gate: Arc<ModelGate>, store: Arc<FileStore>) -> Self {
        Self {
            classifier,
            model_gate,
            store,
            generation_lock: Mutex::new(()),
        }
    }

    pub fn model_gate(&self) -> &Arc<ModelGate> {
        &self.model_gate
    }

    /// Classify `prompt`, generate a clip of roughly `duration_seconds` and store it
    pub async fn generate(&self, prompt: &str, duration_seconds: f64) -> Result<GenerationOutcome, GenerationError> {
        let started = Instant::now();

        let raw = self.classifier.classify(prompt).await?;
        let classification = Classification::parse(&raw);
        info!(
            genre = %classification.genre,
            mood = %classification.mood,
            tempo = %classification.tempo,
            "Prompt classified"
        );

        let full_prompt = build_generation_prompt(prompt, &raw);
        let max_new_tokens = tokens_for_duration(duration_seconds);
        let effective_duration = effective_duration_seconds(max_new_tokens);

        let generator = self
            .model_gate
            .wait_ready()
            .await
            .map_err(GenerationError::ModelUnavailable)?;

        let waveform = {
            let _guard = self.generation_lock.lock().await;
            generator.generate(&full_prompt, max_new_tokens).await?
        };

        let stored = self.store.save(&waveform, AudioKind::Generated).await?;

        info!(
            identifier = %stored.identifier,
            requested_duration = duration_seconds,
            effective_duration,
            max_new_tokens,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generation complete"
        );

        Ok(GenerationOutcome {
            stored,
            classification,
            prompt: full_prompt,
            requested_duration: duration_seconds,
            effective_duration,
            max_new_tokens,
        })
    }
}
