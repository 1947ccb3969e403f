//! Gemini `generateContent` REST client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use studyaid_shared::{GeminiConfig, Result, StudyAidError, read_secret};
use tracing::debug;

/// A single-prompt text completion backend.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Model identifier reported by `/llm/status`.
    fn model(&self) -> &str;

    /// Send one prompt and return the model's text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, config: &GeminiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("StudyAid/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StudyAidError::Network(format!("client build: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
        })
    }

    /// Build a client when the configured key env var is set, `None` otherwise.
    pub fn from_config(config: &GeminiConfig) -> Result<Option<Self>> {
        match read_secret(&config.api_key_env) {
            Some(key) => Ok(Some(Self::new(key, config)?)),
            None => {
                tracing::warn!(
                    env = %config.api_key_env,
                    "Gemini API key not set, AI generation disabled"
                );
                Ok(None)
            }
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default, rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(default, rename = "blockReason")]
    block_reason: Option<String>,
}

#[async_trait]
impl LlmBackend for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| StudyAidError::Network(format!("gemini: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let detail: String = detail.chars().take(300).collect();
            return Err(StudyAidError::Network(format!(
                "gemini: HTTP {status}: {detail}"
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| StudyAidError::parse(format!("gemini response: {e}")))?;

        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(StudyAidError::Generation(format!("prompt blocked: {reason}")));
        }

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(StudyAidError::Generation("empty model response".into()));
        }

        debug!(model = %self.model, chars = text.len(), "gemini completion");
        Ok(text)
    }
}
