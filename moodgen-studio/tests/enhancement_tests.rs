//! Enhancement service tests over stored clips

mod helpers;

use helpers::{sine_wave, test_store};
use moodgen_common::Waveform;
use moodgen_studio::dsp::DspError;
use moodgen_studio::services::{
    AudioEnhancer, AudioKind, EnhancementError, EnhancementKind, EnhancementService, HarmonicSeparator, Outcome,
    StoreError,
};
use std::sync::Arc;

struct BrokenSeparator;

impl HarmonicSeparator for BrokenSeparator {
    fn harmonic(&self, _samples: &[f32], _margin: f32) -> Result<Vec<f32>, DspError> {
        Err(DspError::Fft("plan failed".to_string()))
    }
}

fn tone(sample_rate: u32, seconds: f32) -> Waveform {
    Waveform::mono(sine_wave(440.0, sample_rate, seconds, 0.6), sample_rate)
}

#[tokio::test]
async fn harmonize_stores_new_clip_with_same_length() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(dir.path()).await;
    let source = store.save(&tone(16000, 1.0), AudioKind::Generated).await.unwrap();

    let service = EnhancementService::new(Arc::clone(&store), Arc::new(AudioEnhancer::default()));
    let enhanced = service
        .enhance(&source.identifier, EnhancementKind::Harmonize, None)
        .await
        .unwrap();

    assert_eq!(enhanced.source_identifier, source.identifier);
    assert_eq!(enhanced.outcome, Outcome::Applied);
    assert_eq!(enhanced.stored.kind, AudioKind::Harmonized);
    assert!(enhanced.stored.identifier.starts_with("harmonized_"));
    assert_eq!(enhanced.stored.frames, source.frames);
    assert_eq!(enhanced.stored.sample_rate, 16000);

    let output = store.load(&enhanced.stored.identifier).await.unwrap();
    assert!(output.peak() <= 1.0);
    assert!(output.peak() > 0.1);
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn reharmonize_stores_new_clip_with_same_length() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(dir.path()).await;
    let source = store.save(&tone(22050, 1.0), AudioKind::Generated).await.unwrap();

    let service = EnhancementService::new(Arc::clone(&store), Arc::new(AudioEnhancer::default()));
    let enhanced = service
        .enhance(&source.identifier, EnhancementKind::Reharmonize, Some(1.0))
        .await
        .unwrap();

    assert!(enhanced.outcome.is_applied());
    assert_eq!(enhanced.stored.kind, AudioKind::Reharmonized);
    assert!(enhanced.stored.identifier.starts_with("reharmonized_"));
    assert_eq!(enhanced.stored.frames, source.frames);
    assert_eq!(enhanced.stored.sample_rate, 22050);
}

#[tokio::test]
async fn stereo_source_produces_mono_output() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(dir.path()).await;
    let left = sine_wave(440.0, 16000, 0.5, 0.5);
    let right = vec![0.0; left.len()];
    let stereo = Waveform::from_channels(vec![left, right], 16000).unwrap();
    let source = store.save(&stereo, AudioKind::Generated).await.unwrap();

    let service = EnhancementService::new(Arc::clone(&store), Arc::new(AudioEnhancer::default()));
    let enhanced = service
        .enhance(&source.identifier, EnhancementKind::Harmonize, None)
        .await
        .unwrap();
    assert_eq!(enhanced.stored.channels, 1);
    assert_eq!(enhanced.stored.frames, source.frames);
}

#[tokio::test]
async fn separator_failure_stores_original_audio() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(dir.path()).await;
    let original = tone(16000, 0.5);
    let source = store.save(&original, AudioKind::Generated).await.unwrap();

    let enhancer = AudioEnhancer::with_separator(Arc::new(BrokenSeparator), false);
    let service = EnhancementService::new(Arc::clone(&store), Arc::new(enhancer));
    let enhanced = service
        .enhance(&source.identifier, EnhancementKind::Harmonize, None)
        .await
        .unwrap();

    match &enhanced.outcome {
        Outcome::FellBack { reason } => assert!(reason.contains("plan failed"), "{}", reason),
        Outcome::Applied => panic!("expected fallback"),
    }
    assert_ne!(enhanced.stored.identifier, source.identifier);

    let before = store.load(&source.identifier).await.unwrap();
    let after = store.load(&enhanced.stored.identifier).await.unwrap();
    assert_eq!(before.first_channel(), after.first_channel());
}

#[tokio::test]
async fn missing_source_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(dir.path()).await;
    let service = EnhancementService::new(Arc::clone(&store), Arc::new(AudioEnhancer::default()));

    let err = service
        .enhance("generated_00000000.wav", EnhancementKind::Reharmonize, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EnhancementError::Store(StoreError::NotFound(_))));
    assert_eq!(store.count().await.unwrap(), 0);
}
