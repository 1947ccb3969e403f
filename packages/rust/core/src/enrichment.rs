//! Background material enrichment.
//!
//! After a material is stored, [`Enricher::dispatch`] spawns one task that
//! generates a summary, key concepts and a quiz, one capability call each and
//! in that order. Each artifact fails independently; whatever succeeded is
//! written with a single field-wise upsert. Runs never report errors to the
//! caller: every outcome is logged and recorded on the material's job row.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use studyaid_llm::StudyGenerator;
use studyaid_shared::{ArtifactPatch, EnrichmentSettings, MaterialId, Result};
use studyaid_storage::{JobStatus, Storage};

use crate::generation::{self, truncate_content};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Why a run produced nothing without trying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ContentTooShort,
    GeneratorUnavailable,
    /// Another run for the same material holds the job.
    AlreadyRunning,
}

impl SkipReason {
    fn as_str(&self) -> &'static str {
        match self {
            Self::ContentTooShort => "content too short",
            Self::GeneratorUnavailable => "generator unavailable",
            Self::AlreadyRunning => "already running",
        }
    }
}

/// Which artifacts a finished run persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Produced {
    pub summary: bool,
    pub quiz: bool,
    pub key_concepts: bool,
}

impl Produced {
    fn of(patch: &ArtifactPatch) -> Self {
        Self {
            summary: patch.summary.is_some(),
            quiz: patch.quiz_questions.is_some(),
            key_concepts: patch.key_concepts.is_some(),
        }
    }

    fn count(&self) -> usize {
        [self.summary, self.quiz, self.key_concepts]
            .into_iter()
            .filter(|p| *p)
            .count()
    }
}

/// Result of one enrichment run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    Skipped(SkipReason),
    Completed(Produced),
    /// Nothing was generated, or the store rejected the write.
    Failed(String),
}

// ---------------------------------------------------------------------------
// Enricher
// ---------------------------------------------------------------------------

/// Owns the injected collaborators for background runs.
pub struct Enricher {
    generator: Arc<dyn StudyGenerator>,
    storage: Storage,
    settings: EnrichmentSettings,
}

impl Enricher {
    pub fn new(
        generator: Arc<dyn StudyGenerator>,
        storage: Storage,
        settings: EnrichmentSettings,
    ) -> Self {
        Self {
            generator,
            storage,
            settings,
        }
    }

    /// Spawn a run on the current runtime and return immediately.
    pub fn dispatch(
        self: &Arc<Self>,
        material_id: MaterialId,
        content: String,
    ) -> JoinHandle<EnrichmentOutcome> {
        let this = Arc::clone(self);
        debug!(%material_id, "dispatching enrichment");
        tokio::spawn(async move { this.run(material_id, &content).await })
    }

    /// Enrich one material. Never fails; the outcome is for logging and tests.
    #[instrument(skip_all, fields(%material_id, chars = content.chars().count()))]
    pub async fn run(&self, material_id: MaterialId, content: &str) -> EnrichmentOutcome {
        // Runs get their own connection.
        let storage = match self.storage.open_session().await {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "enrichment could not open a store session");
                return EnrichmentOutcome::Failed(e.to_string());
            }
        };

        let job_id = match storage.claim_enrichment_job(material_id).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                info!("enrichment already running for material, skipping");
                return EnrichmentOutcome::Skipped(SkipReason::AlreadyRunning);
            }
            Err(e) => {
                error!(error = %e, "failed to record enrichment job");
                return EnrichmentOutcome::Failed(e.to_string());
            }
        };

        let outcome = self.generate_and_store(&storage, material_id, content).await;

        let (status, detail) = match &outcome {
            EnrichmentOutcome::Skipped(reason) => (JobStatus::Skipped, Some(reason.as_str().to_string())),
            EnrichmentOutcome::Completed(p) if p.count() == 3 => (JobStatus::Succeeded, None),
            EnrichmentOutcome::Completed(p) => (
                JobStatus::Partial,
                Some(format!("{} of 3 artifacts produced", p.count())),
            ),
            EnrichmentOutcome::Failed(msg) => (JobStatus::Failed, Some(msg.clone())),
        };
        if let Err(e) = storage
            .finish_enrichment_job(&job_id, status, detail.as_deref())
            .await
        {
            warn!(error = %e, job_id, "failed to finish enrichment job");
        }

        outcome
    }

    async fn generate_and_store(
        &self,
        storage: &Storage,
        material_id: MaterialId,
        content: &str,
    ) -> EnrichmentOutcome {
        let chars = content.trim().chars().count();
        if chars < self.settings.min_content_chars {
            debug!(chars, min = self.settings.min_content_chars, "content too short to enrich");
            return EnrichmentOutcome::Skipped(SkipReason::ContentTooShort);
        }
        if !self.generator.is_available() {
            info!("text generation not configured, skipping enrichment");
            return EnrichmentOutcome::Skipped(SkipReason::GeneratorUnavailable);
        }

        let text = truncate_content(content, self.settings.max_content_chars);
        let generator = self.generator.as_ref();
        let s = &self.settings;
        let mut patch = ArtifactPatch::default();

        match generation::summary(generator, text, s.summary_max_length).await {
            Ok(summary) => patch.summary = Some(summary),
            Err(e) => warn!(error = %e, "summary generation failed"),
        }

        match generation::key_concepts(generator, text, s.max_concepts).await {
            Ok(concepts) => patch.key_concepts = Some(concepts),
            Err(e) => warn!(error = %e, "key concept extraction failed"),
        }

        match generation::quiz(generator, text, s.quiz_mcq, s.quiz_short).await {
            Ok(quiz) => patch.quiz_questions = Some(quiz),
            Err(e) => warn!(error = %e, "quiz generation failed"),
        }

        let patch = patch.normalized();
        if patch.is_empty() {
            warn!("no artifacts produced, nothing stored");
            return EnrichmentOutcome::Failed("no artifacts produced".into());
        }

        let produced = Produced::of(&patch);
        match storage.upsert_artifacts(material_id, patch).await {
            Ok(_) => {
                info!(
                    summary = produced.summary,
                    quiz = produced.quiz,
                    key_concepts = produced.key_concepts,
                    "enrichment stored"
                );
                EnrichmentOutcome::Completed(produced)
            }
            Err(e) => {
                error!(error = %e, "failed to store enrichment");
                EnrichmentOutcome::Failed(e.to_string())
            }
        }
    }

    /// Mark jobs left running by a previous process as interrupted and
    /// re-dispatch their materials. Returns how many runs were started.
    pub async fn resume_interrupted(self: &Arc<Self>) -> Result<usize> {
        let materials = self.storage.interrupt_running_jobs().await?;
        let mut resumed = 0;

        for material_id in materials {
            match self.storage.get_material(material_id).await? {
                Some(material) => {
                    self.dispatch(material.id, material.content);
                    resumed += 1;
                }
                None => debug!(%material_id, "interrupted material no longer exists"),
            }
        }

        if resumed > 0 {
            info!(resumed, "resumed interrupted enrichment");
        }
        Ok(resumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeGenerator, Reply, tf};
    use studyaid_shared::{ContentKind, Material, NewMaterial, User};
    use uuid::Uuid;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("sa_core_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    async fn seed(storage: &Storage, content: &str) -> Material {
        let user: User = storage
            .create_user(
                &format!("{}@example.com", Uuid::now_v7()),
                &Uuid::now_v7().to_string(),
                "hash",
            )
            .await
            .expect("user");
        storage
            .insert_material(NewMaterial {
                title: "Cells".into(),
                content: content.into(),
                content_type: ContentKind::Text,
                file_url: None,
                user_id: user.id,
            })
            .await
            .expect("material")
    }

    fn enricher(generator: Arc<FakeGenerator>, storage: &Storage) -> Arc<Enricher> {
        Arc::new(Enricher::new(
            generator,
            storage.clone(),
            EnrichmentSettings::default(),
        ))
    }

    const CONTENT: &str = "Mitochondria generate ATP through cellular respiration. \
        Ribosomes assemble proteins from amino acids in the cytoplasm.";

    #[tokio::test]
    async fn short_content_is_skipped_silently() {
        let storage = test_storage().await;
        let material = seed(&storage, "too short").await;
        let generator = Arc::new(FakeGenerator::available());

        let outcome = enricher(generator.clone(), &storage)
            .run(material.id, "too short")
            .await;

        assert_eq!(outcome, EnrichmentOutcome::Skipped(SkipReason::ContentTooShort));
        assert_eq!(generator.calls(), 0);
        assert!(storage.get_artifacts(material.id).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn unavailable_generator_writes_nothing() {
        let storage = test_storage().await;
        let content = "a".repeat(60);
        let material = seed(&storage, &content).await;
        let generator = Arc::new(FakeGenerator::unavailable());

        let outcome = enricher(generator.clone(), &storage)
            .run(material.id, &content)
            .await;

        assert_eq!(
            outcome,
            EnrichmentOutcome::Skipped(SkipReason::GeneratorUnavailable)
        );
        assert_eq!(generator.calls(), 0);
        assert!(storage.get_artifacts(material.id).await.expect("get").is_none());
        let job = storage
            .latest_enrichment_job(material.id)
            .await
            .expect("job")
            .expect("present");
        assert_eq!(job.status, JobStatus::Skipped);
    }

    #[tokio::test]
    async fn long_content_reaches_generator_as_prefix() {
        let storage = test_storage().await;
        let content = "Zellatmung erzeugt Energie für die Zelle. ".repeat(400);
        let limit = EnrichmentSettings::default().max_content_chars;
        assert!(content.chars().count() > limit);
        let material = seed(&storage, &content).await;
        let generator = Arc::new(FakeGenerator::available());

        let outcome = enricher(generator.clone(), &storage)
            .run(material.id, &content)
            .await;

        assert!(matches!(outcome, EnrichmentOutcome::Completed(_)));
        let inputs = generator.inputs();
        assert_eq!(inputs.len(), 3);
        for input in inputs {
            assert_eq!(input.chars().count(), limit);
            assert!(content.starts_with(&input));
        }
    }

    #[tokio::test]
    async fn failed_artifact_stays_null_and_others_persist() {
        let storage = test_storage().await;
        let material = seed(&storage, CONTENT).await;
        let generator = Arc::new(
            FakeGenerator::available()
                .with_summary(Reply::Fail)
                .with_concepts(Reply::Value(vec!["X".into(), "Y".into()]))
                .with_quiz(Reply::Value(vec![
                    tf("Mitochondria generate ATP."),
                    tf("Ribosomes assemble proteins."),
                    tf("Amino acids build proteins."),
                    tf("The main topic is cells."),
                ])),
        );
        let enricher = Arc::new(Enricher::new(
            generator.clone(),
            storage.clone(),
            EnrichmentSettings {
                quiz_mcq: 3,
                quiz_short: 1,
                ..EnrichmentSettings::default()
            },
        ));

        let outcome = enricher.run(material.id, CONTENT).await;
        assert_eq!(
            outcome,
            EnrichmentOutcome::Completed(Produced {
                summary: false,
                quiz: true,
                key_concepts: true
            })
        );

        let stored = storage
            .get_artifacts(material.id)
            .await
            .expect("get")
            .expect("row");
        assert!(stored.summary.is_none());
        assert_eq!(stored.key_concepts, Some(vec!["X".to_string(), "Y".to_string()]));
        let quiz = stored.quiz_questions.expect("quiz");
        assert_eq!(quiz.len(), 3);
        assert!(quiz.iter().all(|q| !q.question().contains("main topic")));

        let job = storage
            .latest_enrichment_job(material.id)
            .await
            .expect("job")
            .expect("present");
        assert_eq!(job.status, JobStatus::Partial);

        // A later run that only produces a summary keeps the other fields.
        generator.set_summary(Reply::Value("S".into()));
        generator.set_concepts(Reply::Fail);
        generator.set_quiz(Reply::Fail);
        enricher.run(material.id, CONTENT).await;

        let merged = storage
            .get_artifacts(material.id)
            .await
            .expect("get")
            .expect("row");
        assert_eq!(merged.summary.as_deref(), Some("S"));
        assert_eq!(merged.key_concepts, stored.key_concepts);
        assert_eq!(merged.quiz_questions.map(|q| q.len()), Some(3));
    }

    #[tokio::test]
    async fn all_failures_write_nothing() {
        let storage = test_storage().await;
        let material = seed(&storage, CONTENT).await;
        let generator = Arc::new(
            FakeGenerator::available()
                .with_summary(Reply::Fail)
                .with_concepts(Reply::Fail)
                .with_quiz(Reply::Fail),
        );

        let outcome = enricher(generator, &storage).run(material.id, CONTENT).await;
        assert!(matches!(outcome, EnrichmentOutcome::Failed(_)));
        assert!(storage.get_artifacts(material.id).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn concurrent_run_for_same_material_is_skipped() {
        let storage = test_storage().await;
        let material = seed(&storage, CONTENT).await;
        storage
            .claim_enrichment_job(material.id)
            .await
            .expect("claim")
            .expect("claimed");

        let generator = Arc::new(FakeGenerator::available());
        let outcome = enricher(generator.clone(), &storage)
            .run(material.id, CONTENT)
            .await;
        assert_eq!(outcome, EnrichmentOutcome::Skipped(SkipReason::AlreadyRunning));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn dispatch_runs_in_background() {
        let storage = test_storage().await;
        let material = seed(&storage, CONTENT).await;
        let generator = Arc::new(FakeGenerator::available());

        let handle = enricher(generator, &storage).dispatch(material.id, CONTENT.to_string());
        let outcome = handle.await.expect("join");
        assert!(matches!(outcome, EnrichmentOutcome::Completed(p) if p.count() == 3));
        assert!(storage.get_artifacts(material.id).await.expect("get").is_some());
    }

    #[tokio::test]
    async fn interrupted_jobs_are_resumed() {
        let storage = test_storage().await;
        let material = seed(&storage, CONTENT).await;
        // Simulates a process that died mid-run.
        storage
            .claim_enrichment_job(material.id)
            .await
            .expect("claim")
            .expect("claimed");

        let generator = Arc::new(FakeGenerator::available());
        let enricher = enricher(generator, &storage);
        assert_eq!(enricher.resume_interrupted().await.expect("resume"), 1);

        // Wait for the spawned run to finish.
        for _ in 0..100 {
            if storage.get_artifacts(material.id).await.expect("get").is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(storage.get_artifacts(material.id).await.expect("get").is_some());
    }
}
