//! # moodgen common library
//!
//! Shared code for the moodgen workspace:
//! - Error and Result types
//! - TOML/environment configuration and root folder resolution
//! - Waveform model and PCM quantization helpers
//! - Duration to token budget mapping
//! - SQLite pool initialization

pub mod config;
pub mod db;
pub mod error;
pub mod tokens;
pub mod waveform;

pub use error::{Error, Result};
pub use tokens::{effective_duration_seconds, tokens_for_duration};
pub use waveform::Waveform;
