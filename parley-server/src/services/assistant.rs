//! Assistant responder: mention detection and reply generation.
//!
//! Generation failures never surface to chat participants. Whatever goes
//! wrong upstream, `respond` resolves to either a generated reply or the
//! configured fallback text.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use shared::config::AssistantConfig;
use thiserror::Error;
use tracing::{instrument, warn};

/// Errors raised by a generation backend.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// The backend request failed or timed out.
    #[error("generation request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered but the payload had no usable text.
    #[error("generation response contained no text")]
    EmptyResponse,

    /// No API key was available in the environment.
    #[error("assistant API key not set in '{0}'")]
    MissingKey(String),

    /// The mention token produced an unusable pattern.
    #[error("invalid mention token: {0}")]
    MentionPattern(#[from] regex::Error),
}

/// A text generation backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Produce a reply for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, AssistantError>;
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Backend that calls a Gemini-style `generateContent` HTTP endpoint.
#[derive(Debug)]
pub struct HttpGenerationBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl HttpGenerationBackend {
    /// Build a backend from config, reading the API key from the configured
    /// environment variable.
    ///
    /// # Errors
    /// [`AssistantError::MissingKey`] when the variable is unset or empty.
    pub fn from_config(config: &AssistantConfig) -> Result<Self, AssistantError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AssistantError::MissingKey(config.api_key_env.clone()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<String, AssistantError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(&self.api_url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<GenerateResponse>()
            .await?;

        let text: String = response
            .candidates
            .first()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .iter()
                    .map(|part| part.text.as_str())
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AssistantError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Backend used when no API key is configured. Every call fails, so mentions
/// still get the fallback reply rather than silence.
#[derive(Debug)]
pub struct UnconfiguredBackend {
    key_env: String,
}

impl UnconfiguredBackend {
    /// Creates a backend that reports the missing key variable.
    pub fn new(key_env: String) -> Self {
        Self { key_env }
    }
}

#[async_trait]
impl GenerationBackend for UnconfiguredBackend {
    async fn generate(&self, _prompt: &str) -> Result<String, AssistantError> {
        Err(AssistantError::MissingKey(self.key_env.clone()))
    }
}

/// Mention-triggered responder over a pluggable generation backend.
#[derive(Clone)]
pub struct AssistantService {
    backend: Arc<dyn GenerationBackend>,
    mention_lower: String,
    mention_strip: Regex,
    sender_name: String,
    fallback_reply: String,
}

impl std::fmt::Debug for AssistantService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantService")
            .field("sender_name", &self.sender_name)
            .finish()
    }
}

impl AssistantService {
    /// Creates a responder for the configured mention token.
    ///
    /// # Errors
    /// [`AssistantError::MentionPattern`] if the token cannot form a pattern.
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        config: &AssistantConfig,
    ) -> Result<Self, AssistantError> {
        let mention_strip = Regex::new(&format!(r"(?i){}\s*", regex::escape(&config.mention_token)))?;

        Ok(Self {
            backend,
            mention_lower: config.mention_token.to_lowercase(),
            mention_strip,
            sender_name: config.sender_name.clone(),
            fallback_reply: config.fallback_reply.clone(),
        })
    }

    /// Reserved sender name the responder posts under.
    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }

    /// Whether `text` mentions the assistant. Case-insensitive substring
    /// match anywhere in the text.
    pub fn mentions(&self, text: &str) -> bool {
        text.to_lowercase().contains(&self.mention_lower)
    }

    /// Generate a reply for a mention, substituting the fallback text on any
    /// backend failure. Mention tokens are stripped from the prompt first.
    #[instrument(name = "assistant.respond", skip(self, raw_text))]
    pub async fn respond(&self, room_name: &str, raw_text: &str) -> String {
        let question = self.mention_strip.replace_all(raw_text, "");
        let prompt = format!(
            "You are a helpful AI assistant in a chat room called \"{room_name}\".\n\
             A user is asking: {}\n\n\
             Give a concise, helpful response. Keep it brief and to the point.",
            question.trim()
        );

        match self.backend.generate(&prompt).await {
            Ok(reply) => {
                metrics::counter!("assistant_replies_total", "outcome" => "ok").increment(1);
                reply.trim().to_string()
            }
            Err(error) => {
                warn!(%error, "assistant generation failed, using fallback");
                metrics::counter!("assistant_replies_total", "outcome" => "fallback").increment(1);
                self.fallback_reply.clone()
            }
        }
    }
}
