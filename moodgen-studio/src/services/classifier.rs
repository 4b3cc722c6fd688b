//! Mood classification collaborator
//!
//! The classifier turns a free-text description into a short block of
//! `Genre:` / `Mood:` / `Tempo:` lines. Production uses the Gemini
//! `generateContent` REST endpoint; tests plug in their own
//! [`MoodClassifier`].

use async_trait::async_trait;
use moodgen_common::config::ClassifierConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("moodgen-studio/", env!("CARGO_PKG_VERSION"));

/// Value used for a field whose label line is missing
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty classification response")]
    EmptyResponse,
}

/// Text classification collaborator
#[async_trait]
pub trait MoodClassifier: Send + Sync {
    /// Free-form classification text for `text`
    async fn classify(&self, text: &str) -> Result<String, ClassifierError>;
}

/// Parsed classification, plus the raw text it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub genre: String,
    pub mood: String,
    pub tempo: String,
    pub raw: String,
}

impl Classification {
    /// Parse `Genre:`/`Mood:`/`Tempo:` lines in any order.
    ///
    /// Labels match case-insensitively and may be wrapped in markdown
    /// (`- **Genre:** Jazz`). The first occurrence of each label wins.
    pub fn parse(raw: &str) -> Self {
        let mut genre = None;
        let mut mood = None;
        let mut tempo = None;

        for line in raw.lines() {
            let Some((label, value)) = split_label(line) else {
                continue;
            };
            let slot = match label.as_str() {
                "genre" => &mut genre,
                "mood" => &mut mood,
                "tempo" => &mut tempo,
                _ => continue,
            };
            if slot.is_none() && !value.is_empty() {
                *slot = Some(value);
            }
        }

        Self {
            genre: genre.unwrap_or_else(|| UNKNOWN.to_string()),
            mood: mood.unwrap_or_else(|| UNKNOWN.to_string()),
            tempo: tempo.unwrap_or_else(|| UNKNOWN.to_string()),
            raw: raw.trim().to_string(),
        }
    }
}

/// `"- **Genre:** Jazz"` -> `("genre", "Jazz")`
fn split_label(line: &str) -> Option<(String, String)> {
    let line = line.trim_start().trim_start_matches(['-', '*', '•']).trim_start();
    let (label, value) = line.split_once(':')?;
    let label = label.trim_matches(|c: char| c == '*' || c.is_whitespace());
    let value = value.trim_matches(|c: char| c == '*' || c.is_whitespace());
    Some((label.to_ascii_lowercase(), value.to_string()))
}

/// Instruction sent to the language model for `user_input`
pub fn classification_prompt(user_input: &str) -> String {
    format!(
        "Classify the following text into music genre, mood, and tempo. \
         Give tempo in both words and BPM.\n\n\
         Text: \"{}\"\n\n\
         Output format:\n\
         Genre: <genre>\n\
         Mood: <mood>\n\
         Tempo: <tempo word> (<bpm> BPM)",
        user_input
    )
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// Gemini `generateContent` client
pub struct GeminiClassifier {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiClassifier {
    pub fn new(config: &ClassifierConfig, api_key: String) -> Result<Self, ClassifierError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl MoodClassifier for GeminiClassifier {
    async fn classify(&self, text: &str) -> Result<String, ClassifierError> {
        let prompt = classification_prompt(text);
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: &prompt }],
            }],
        };

        tracing::debug!(model = %self.model, "Requesting mood classification");

        let response = self
            .http_client
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Api(status.as_u16(), error_text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::Parse(e.to_string()))?;

        let classification = parsed.text().ok_or(ClassifierError::EmptyResponse)?;
        tracing::info!(chars = classification.len(), "Mood classification received");
        Ok(classification)
    }
}
