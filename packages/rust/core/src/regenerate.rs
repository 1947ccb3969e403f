//! On-demand generation for a single material.
//!
//! Unlike background enrichment these calls surface every problem to the
//! caller. Checks run in a fixed order: ownership, parameter ranges, content
//! length, then capability availability. A successful result is persisted
//! with the same field-wise upsert the background path uses.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::Serialize;
use tracing::{info, instrument, warn};

use studyaid_llm::StudyGenerator;
use studyaid_shared::{
    ArtifactPatch, CONCEPTS_RANGE, MCQ_RANGE, MIN_CONCEPTS_CONTENT_CHARS, MIN_QUIZ_CONTENT_CHARS,
    MIN_SUMMARY_CONTENT_CHARS, MIN_UPLOAD_TEXT_CHARS, Material, MaterialId, Question, Result,
    SHORT_ANSWER_RANGE, SUMMARY_LENGTH_RANGE, StudyAidError, UserId,
};
use studyaid_storage::Storage;

use crate::generation::{self, truncate_content};

#[derive(Debug, Clone, Serialize)]
pub struct SummaryResult {
    pub summary: String,
    pub material_id: MaterialId,
    pub material_title: String,
    pub word_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizResult {
    pub quiz_questions: Vec<Question>,
    pub material_id: MaterialId,
    pub total_questions: usize,
    /// Count per question `type`.
    pub question_types: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConceptsResult {
    pub key_concepts: Vec<String>,
    pub material_id: MaterialId,
    pub total_concepts: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_questions: Option<Vec<Question>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_concepts: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub material_id: MaterialId,
    pub material_title: String,
    pub analysis_results: AnalysisResults,
    pub success_count: usize,
    pub total_operations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

/// Parameters for a full analysis.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisParams {
    pub max_summary_length: usize,
    pub num_mcq: usize,
    pub num_short: usize,
    pub max_concepts: usize,
}

/// Borrowed collaborators for one request.
pub struct Regenerator<'a> {
    storage: &'a Storage,
    generator: &'a dyn StudyGenerator,
    max_content_chars: usize,
}

impl<'a> Regenerator<'a> {
    pub fn new(
        storage: &'a Storage,
        generator: &'a dyn StudyGenerator,
        max_content_chars: usize,
    ) -> Self {
        Self {
            storage,
            generator,
            max_content_chars,
        }
    }

    #[instrument(skip_all, fields(%material_id, max_length))]
    pub async fn summary(
        &self,
        user_id: UserId,
        material_id: MaterialId,
        max_length: usize,
    ) -> Result<SummaryResult> {
        let material = self.owned_material(user_id, material_id).await?;
        check_range("max_length", max_length, &SUMMARY_LENGTH_RANGE)?;
        check_content(&material, MIN_SUMMARY_CONTENT_CHARS, "summary generation")?;
        self.ensure_available()?;

        let text = truncate_content(&material.content, self.max_content_chars);
        let summary = generation::summary(self.generator, text, max_length).await?;

        self.persist(
            material.id,
            ArtifactPatch {
                summary: Some(summary.clone()),
                ..ArtifactPatch::default()
            },
        )
        .await?;

        info!("summary regenerated");
        Ok(SummaryResult {
            word_count: summary.split_whitespace().count(),
            summary,
            material_id: material.id,
            material_title: material.title,
        })
    }

    #[instrument(skip_all, fields(%material_id, num_mcq, num_short))]
    pub async fn quiz(
        &self,
        user_id: UserId,
        material_id: MaterialId,
        num_mcq: usize,
        num_short: usize,
    ) -> Result<QuizResult> {
        let material = self.owned_material(user_id, material_id).await?;
        check_range("num_mcq", num_mcq, &MCQ_RANGE)?;
        check_range("num_short", num_short, &SHORT_ANSWER_RANGE)?;
        check_content(&material, MIN_QUIZ_CONTENT_CHARS, "quiz generation")?;
        self.ensure_available()?;

        let text = truncate_content(&material.content, self.max_content_chars);
        let questions = generation::quiz(self.generator, text, num_mcq, num_short).await?;

        self.persist(
            material.id,
            ArtifactPatch {
                quiz_questions: Some(questions.clone()),
                ..ArtifactPatch::default()
            },
        )
        .await?;

        info!(total = questions.len(), "quiz regenerated");
        Ok(QuizResult {
            total_questions: questions.len(),
            question_types: count_types(&questions),
            quiz_questions: questions,
            material_id: material.id,
        })
    }

    #[instrument(skip_all, fields(%material_id, max_concepts))]
    pub async fn key_concepts(
        &self,
        user_id: UserId,
        material_id: MaterialId,
        max_concepts: usize,
    ) -> Result<ConceptsResult> {
        let material = self.owned_material(user_id, material_id).await?;
        check_range("max_concepts", max_concepts, &CONCEPTS_RANGE)?;
        check_content(&material, MIN_CONCEPTS_CONTENT_CHARS, "concept extraction")?;
        self.ensure_available()?;

        let text = truncate_content(&material.content, self.max_content_chars);
        let concepts = generation::key_concepts(self.generator, text, max_concepts).await?;

        self.persist(
            material.id,
            ArtifactPatch {
                key_concepts: Some(concepts.clone()),
                ..ArtifactPatch::default()
            },
        )
        .await?;

        info!(total = concepts.len(), "key concepts regenerated");
        Ok(ConceptsResult {
            total_concepts: concepts.len(),
            key_concepts: concepts,
            material_id: material.id,
        })
    }

    /// Run all three generations. Individual failures are reported in
    /// `errors`; the call fails only when nothing was produced.
    #[instrument(skip_all, fields(%material_id))]
    pub async fn analyze(
        &self,
        user_id: UserId,
        material_id: MaterialId,
        params: AnalysisParams,
    ) -> Result<AnalysisResult> {
        let material = self.owned_material(user_id, material_id).await?;
        check_range("max_summary_length", params.max_summary_length, &SUMMARY_LENGTH_RANGE)?;
        check_range("num_mcq", params.num_mcq, &MCQ_RANGE)?;
        check_range("num_short", params.num_short, &SHORT_ANSWER_RANGE)?;
        check_range("max_concepts", params.max_concepts, &CONCEPTS_RANGE)?;
        check_content(&material, MIN_UPLOAD_TEXT_CHARS, "comprehensive analysis")?;
        self.ensure_available()?;

        let text = truncate_content(&material.content, self.max_content_chars);
        let mut results = AnalysisResults::default();
        let mut errors = Vec::new();

        match generation::summary(self.generator, text, params.max_summary_length).await {
            Ok(s) => results.summary = Some(s),
            Err(e) => errors.push(format!("Summary generation failed: {e}")),
        }
        match generation::quiz(self.generator, text, params.num_mcq, params.num_short).await {
            Ok(q) => results.quiz_questions = Some(q),
            Err(e) => errors.push(format!("Quiz generation failed: {e}")),
        }
        match generation::key_concepts(self.generator, text, params.max_concepts).await {
            Ok(c) => results.key_concepts = Some(c),
            Err(e) => errors.push(format!("Concept extraction failed: {e}")),
        }

        let success_count = 3 - errors.len();
        if success_count == 0 {
            warn!(?errors, "analysis produced nothing");
            return Err(StudyAidError::Generation(format!(
                "All analysis operations failed: {}",
                errors.join("; ")
            )));
        }

        self.persist(
            material.id,
            ArtifactPatch {
                summary: results.summary.clone(),
                quiz_questions: results.quiz_questions.clone(),
                key_concepts: results.key_concepts.clone(),
            },
        )
        .await?;

        info!(success_count, "analysis complete");
        Ok(AnalysisResult {
            material_id: material.id,
            material_title: material.title,
            analysis_results: results,
            success_count,
            total_operations: 3,
            errors: (!errors.is_empty()).then_some(errors),
        })
    }

    async fn owned_material(&self, user_id: UserId, material_id: MaterialId) -> Result<Material> {
        self.storage
            .get_material_for_user(material_id, user_id)
            .await?
            .ok_or_else(|| StudyAidError::NotFound("Material".into()))
    }

    fn ensure_available(&self) -> Result<()> {
        if self.generator.is_available() {
            Ok(())
        } else {
            Err(StudyAidError::Unavailable("LLM service".into()))
        }
    }

    async fn persist(&self, material_id: MaterialId, patch: ArtifactPatch) -> Result<()> {
        // A fully blank patch is not an error for the caller; nothing to store.
        let patch = patch.normalized();
        if patch.is_empty() {
            return Ok(());
        }
        self.storage.upsert_artifacts(material_id, patch).await?;
        Ok(())
    }
}

fn check_range(name: &str, value: usize, range: &RangeInclusive<usize>) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(StudyAidError::validation(format!(
            "{name} must be between {} and {}",
            range.start(),
            range.end()
        )))
    }
}

fn check_content(material: &Material, min_chars: usize, purpose: &str) -> Result<()> {
    if material.content.trim().chars().count() < min_chars {
        return Err(StudyAidError::validation(format!(
            "Material content is too short for {purpose} (minimum {min_chars} characters)"
        )));
    }
    Ok(())
}

fn count_types(questions: &[Question]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for q in questions {
        *counts.entry(q.kind().to_string()).or_insert(0) += 1;
    }
    counts
}
