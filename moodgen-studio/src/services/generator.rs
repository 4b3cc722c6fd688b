//! Text-to-music generation collaborator
//!
//! The model runs in a separate inference server. [`HttpMusicGenerator`]
//! talks to it over HTTP:
//! - `GET {endpoint}/health` answers once the model weights are loaded
//! - `POST {endpoint}/generate` with `{prompt, max_new_tokens}` returns a WAV body

use super::wav_codec;
use async_trait::async_trait;
use moodgen_common::config::GeneratorConfig;
use moodgen_common::Waveform;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("moodgen-studio/", env!("CARGO_PKG_VERSION"));

/// Readiness probe timeout; generation itself uses the configured timeout
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Model not ready: {0}")]
    NotReady(String),

    #[error("Invalid audio from generator: {0}")]
    InvalidAudio(String),
}

/// Text-to-audio model collaborator
#[async_trait]
pub trait MusicGenerator: Send + Sync {
    /// Generate a clip for `prompt` with a budget of `max_new_tokens`
    async fn generate(&self, prompt: &str, max_new_tokens: u32) -> Result<Waveform, GeneratorError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    max_new_tokens: u32,
}

/// Body of the inference server's health endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratorHealth {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
}

/// Client for the inference server
pub struct HttpMusicGenerator {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpMusicGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self, GeneratorError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GeneratorError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Build the client and wait for the server to report its model loaded
    pub async fn connect(config: &GeneratorConfig) -> Result<Self, GeneratorError> {
        let generator = Self::new(config)?;
        let health = generator.health().await?;
        tracing::info!(
            endpoint = %generator.endpoint,
            model = health.model.as_deref().unwrap_or("unknown"),
            sample_rate = ?health.sample_rate,
            "Music generator ready"
        );
        Ok(generator)
    }

    /// Query the readiness endpoint
    pub async fn health(&self) -> Result<GeneratorHealth, GeneratorError> {
        let response = self
            .http_client
            .get(format!("{}/health", self.endpoint))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| GeneratorError::NotReady(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GeneratorError::NotReady(format!("HTTP {}: {}", status.as_u16(), error_text)));
        }

        // Servers may answer with an empty or non-JSON body
        let body = response.bytes().await.unwrap_or_default();
        Ok(serde_json::from_slice(&body).unwrap_or_default())
    }
}

#[async_trait]
impl MusicGenerator for HttpMusicGenerator {
    async fn generate(&self, prompt: &str, max_new_tokens: u32) -> Result<Waveform, GeneratorError> {
        tracing::debug!(max_new_tokens, "Requesting music generation");

        let response = self
            .http_client
            .post(format!("{}/generate", self.endpoint))
            .json(&GenerateRequest { prompt, max_new_tokens })
            .send()
            .await
            .map_err(|e| GeneratorError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Api(status.as_u16(), error_text));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GeneratorError::Network(e.to_string()))?;
        let waveform =
            wav_codec::decode_bytes(&bytes).map_err(|e| GeneratorError::InvalidAudio(e.to_string()))?;
        if waveform.is_empty() {
            return Err(GeneratorError::InvalidAudio("no samples".to_string()));
        }

        tracing::info!(
            frames = waveform.frames(),
            sample_rate = waveform.sample_rate(),
            channels = waveform.channel_count(),
            "Generated waveform received"
        );
        Ok(waveform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_trims_endpoint() {
        let config = GeneratorConfig {
            endpoint: "http://localhost:9000/".to_string(),
            timeout_secs: 5,
        };
        let generator = HttpMusicGenerator::new(&config).unwrap();
        assert_eq!(generator.endpoint, "http://localhost:9000");
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(GenerateRequest {
            prompt: "calm piano",
            max_new_tokens: 512,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"prompt": "calm piano", "max_new_tokens": 512}));
    }

    #[test]
    fn test_health_body_is_lenient() {
        let health: GeneratorHealth = serde_json::from_str(r#"{"model":"musicgen-small","sample_rate":32000,"extra":1}"#).unwrap();
        assert_eq!(health.model.as_deref(), Some("musicgen-small"));
        assert_eq!(health.sample_rate, Some(32000));
    }

    #[tokio::test]
    async fn test_connect_fails_when_server_unreachable() {
        let config = GeneratorConfig {
            // Port 9 (discard) on localhost is not expected to serve HTTP
            endpoint: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
        };
        let result = HttpMusicGenerator::connect(&config).await;
        assert!(matches!(result, Err(GeneratorError::NotReady(_))));
    }
}
