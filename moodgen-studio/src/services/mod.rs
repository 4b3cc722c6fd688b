//! Service layer: collaborators, pipelines and storage

pub mod classifier;
pub mod enhancement;
pub mod enhancer;
pub mod file_store;
pub mod generator;
pub mod model_gate;
pub mod orchestrator;
pub mod retention;
pub mod wav_codec;

pub use classifier::{Classification, ClassifierError, GeminiClassifier, MoodClassifier};
pub use enhancement::{EnhancedFile, EnhancementError, EnhancementService};
pub use enhancer::{AudioEnhancer, Enhancement, EnhancementKind, HarmonicSeparator, MedianHpss, Outcome};
pub use file_store::{AudioKind, FileStore, PurgeReport, RetentionPolicy, StoreError, StoredAudioFile};
pub use generator::{GeneratorError, HttpMusicGenerator, MusicGenerator};
pub use model_gate::{ModelGate, ModelState};
pub use orchestrator::{GenerationError, GenerationOrchestrator, GenerationOutcome};
