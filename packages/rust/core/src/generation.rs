//! Checked generation: call the capability, then apply the acceptance rules.
//!
//! Used by both background enrichment and the on-demand `/llm` operations so
//! the two paths agree on what counts as usable output. A capability error is
//! passed through (the artifact was not produced); usable-but-invalid output
//! is replaced by the deterministic fallback.

use studyaid_llm::{StudyGenerator, fallback, validate};
use studyaid_shared::{Question, Result};
use tracing::debug;

/// Prefix of `content` holding at most `max_chars` characters.
pub fn truncate_content(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &content[..byte_idx],
        None => content,
    }
}

pub async fn summary(
    generator: &dyn StudyGenerator,
    text: &str,
    max_length: usize,
) -> Result<String> {
    let raw = generator.generate_summary(text, max_length).await?;
    Ok(validate::accept_summary(&raw).unwrap_or_else(|| {
        debug!("blank summary replaced by fallback");
        fallback::summary(text, max_length)
    }))
}

pub async fn quiz(
    generator: &dyn StudyGenerator,
    text: &str,
    num_mcq: usize,
    num_short: usize,
) -> Result<Vec<Question>> {
    let questions = generator.generate_quiz(text, num_mcq, num_short).await?;
    Ok(
        validate::accept_quiz(questions, num_mcq + num_short).unwrap_or_else(|| {
            debug!("quiz below acceptance threshold replaced by fallback");
            fallback::quiz(text, num_mcq, num_short)
        }),
    )
}

pub async fn key_concepts(
    generator: &dyn StudyGenerator,
    text: &str,
    max_count: usize,
) -> Result<Vec<String>> {
    let concepts = generator.generate_key_concepts(text, max_count).await?;
    let concepts = validate::normalize_concepts(concepts, max_count);
    if concepts.is_empty() {
        debug!("empty concept list replaced by fallback");
        return Ok(fallback::key_concepts(text, max_count));
    }
    Ok(concepts)
}
