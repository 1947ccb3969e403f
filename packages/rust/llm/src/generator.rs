//! The text-generation capability consumed by enrichment and the `/llm` routes.

use std::sync::Arc;

use async_trait::async_trait;
use studyaid_shared::{Question, Result};
use tracing::{debug, warn};

use crate::fallback::{self, QuizMix};
use crate::gemini::LlmBackend;
use crate::{prompts, validate};

/// Generates study aids from material text.
///
/// Implementations recover from their own backend failures where they can;
/// callers still treat an `Err` as "this artifact was not produced".
#[async_trait]
pub trait StudyGenerator: Send + Sync {
    /// Whether a real model is configured.
    fn is_available(&self) -> bool;

    /// Model identifier, when one is configured.
    fn model(&self) -> Option<String>;

    async fn generate_summary(&self, text: &str, max_length: usize) -> Result<String>;

    async fn generate_quiz(
        &self,
        text: &str,
        num_mcq: usize,
        num_short: usize,
    ) -> Result<Vec<Question>>;

    async fn generate_key_concepts(&self, text: &str, max_count: usize) -> Result<Vec<String>>;
}

/// [`StudyGenerator`] backed by an LLM, degrading to [`fallback`] output.
pub struct LlmStudyGenerator {
    backend: Option<Arc<dyn LlmBackend>>,
}

impl LlmStudyGenerator {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// A generator with no model; every call returns fallback output.
    pub fn unconfigured() -> Self {
        Self { backend: None }
    }
}

#[async_trait]
impl StudyGenerator for LlmStudyGenerator {
    fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    fn model(&self) -> Option<String> {
        self.backend.as_ref().map(|b| b.model().to_string())
    }

    async fn generate_summary(&self, text: &str, max_length: usize) -> Result<String> {
        let Some(backend) = &self.backend else {
            return Ok(fallback::summary(text, max_length));
        };

        match backend.complete(&prompts::summary(text, max_length)).await {
            Ok(raw) => match validate::accept_summary(&raw) {
                Some(summary) => Ok(summary),
                None => {
                    warn!("blank summary from model, using fallback");
                    Ok(fallback::summary(text, max_length))
                }
            },
            Err(e) => {
                warn!(error = %e, "summary generation failed, using fallback");
                Ok(fallback::summary(text, max_length))
            }
        }
    }

    async fn generate_quiz(
        &self,
        text: &str,
        num_mcq: usize,
        num_short: usize,
    ) -> Result<Vec<Question>> {
        let Some(backend) = &self.backend else {
            return Ok(fallback::quiz(text, num_mcq, num_short));
        };

        let mix = QuizMix::new(num_mcq, num_short);
        for strict in [false, true] {
            let raw = match backend.complete(&prompts::quiz(text, mix, strict)).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(error = %e, "quiz generation failed, using fallback");
                    return Ok(fallback::quiz(text, num_mcq, num_short));
                }
            };

            let Some(parsed) = validate::parse_quiz(&raw) else {
                debug!(strict, "quiz response is not a JSON array");
                continue;
            };
            if let Some(accepted) = validate::accept_quiz(parsed, mix.total()) {
                debug!(strict, questions = accepted.len(), "quiz accepted");
                return Ok(accepted);
            }
        }

        warn!("quiz failed validation twice, using fallback");
        Ok(fallback::quiz(text, num_mcq, num_short))
    }

    async fn generate_key_concepts(&self, text: &str, max_count: usize) -> Result<Vec<String>> {
        let Some(backend) = &self.backend else {
            return Ok(fallback::key_concepts(text, max_count));
        };

        let raw = match backend.complete(&prompts::key_concepts(text, max_count)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "concept extraction failed, using fallback");
                return Ok(fallback::key_concepts(text, max_count));
            }
        };

        let concepts = validate::parse_concepts(&raw)
            .map(|c| validate::normalize_concepts(c, max_count))
            .unwrap_or_default();
        if concepts.is_empty() {
            warn!("unusable concept list from model, using fallback");
            return Ok(fallback::key_concepts(text, max_count));
        }
        Ok(concepts)
    }
}
