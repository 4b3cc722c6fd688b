//! Shared fixtures for moodgen-studio integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use moodgen_common::Waveform;
use moodgen_studio::services::{
    AudioEnhancer, ClassifierError, FileStore, GeneratorError, ModelGate, MoodClassifier, MusicGenerator,
};
use moodgen_studio::AppState;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const EPIC_CLASSIFICATION: &str = "Genre: Orchestral\nMood: Epic\nTempo: Moderate (90 BPM)";

/// Sine tone at `freq` Hz
pub fn sine_wave(freq: f32, sample_rate: u32, seconds: f32, amplitude: f32) -> Vec<f32> {
    let n = (sample_rate as f32 * seconds) as usize;
    (0..n)
        .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Write a 16-bit PCM WAV file with a tone on every channel
pub fn write_tone_wav(path: &Path, sample_rate: u32, channels: u16, seconds: f32) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for s in sine_wave(440.0, sample_rate, seconds, 0.5) {
        for _ in 0..channels {
            writer.write_sample((s * 32767.0) as i16).unwrap();
        }
    }
    writer.finalize().unwrap();
}

/// Classifier returning a fixed answer (or a fixed failure)
pub struct MockClassifier {
    response: Result<String, String>,
    pub calls: AtomicUsize,
    pub inputs: Mutex<Vec<String>>,
}

impl MockClassifier {
    pub fn answering(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MoodClassifier for MockClassifier {
    async fn classify(&self, text: &str) -> Result<String, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(text.to_string());
        match &self.response {
            Ok(r) => Ok(r.clone()),
            Err(m) => Err(ClassifierError::Network(m.clone())),
        }
    }
}

/// Generator recording its calls and returning a short tone
pub struct MockGenerator {
    pub sample_rate: u32,
    pub seconds: f32,
    pub delay: Duration,
    pub fail_with: Option<String>,
    pub calls: Mutex<Vec<(String, u32)>>,
    active: AtomicUsize,
    pub max_concurrent: AtomicUsize,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            seconds: 0.5,
            delay: Duration::ZERO,
            fail_with: None,
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        }
    }
}

impl MockGenerator {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn recorded_calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MusicGenerator for MockGenerator {
    async fn generate(&self, prompt: &str, max_new_tokens: u32) -> Result<Waveform, GeneratorError> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now_active, Ordering::SeqCst);
        self.calls.lock().unwrap().push((prompt.to_string(), max_new_tokens));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if let Some(message) = &self.fail_with {
            return Err(GeneratorError::Api(500, message.clone()));
        }
        Ok(Waveform::mono(
            sine_wave(330.0, self.sample_rate, self.seconds, 0.6),
            self.sample_rate,
        ))
    }
}

/// File store over an in-memory catalog and a temp audio dir
pub async fn test_store(root: &Path) -> Arc<FileStore> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    moodgen_common::db::init_tables(&pool).await.unwrap();
    Arc::new(FileStore::new(pool, root.join("generated")))
}

/// Fully wired state with mock collaborators and an open model gate
pub async fn test_state(
    root: &Path,
    classifier: Arc<MockClassifier>,
    generator: Arc<MockGenerator>,
) -> AppState {
    let store = test_store(root).await;
    let gate = Arc::new(ModelGate::ready(generator));
    AppState::new(store, classifier, gate, AudioEnhancer::default())
}
