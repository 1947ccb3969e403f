//! Generated artifact sets (summary, quiz, key concepts), one row per material.

use libsql::params;
use studyaid_shared::{ArtifactPatch, ArtifactSet, MaterialId, Question, Result, StudyAidError};
use uuid::Uuid;

use crate::{Storage, now_rfc3339, parse_id, parse_timestamp, storage_err};

impl Storage {
    /// The artifact set for a material, if any field was ever generated.
    pub async fn get_artifacts(&self, material_id: MaterialId) -> Result<Option<ArtifactSet>> {
        let mut rows = self
            .conn
            .query(
                "SELECT material_id, summary, quiz_questions, key_concepts, generated_at
                 FROM generated_data WHERE material_id = ?1",
                params![material_id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_artifacts(&row)?)),
            None => Ok(None),
        }
    }

    /// Field-wise upsert keyed by material.
    ///
    /// Fields absent from `patch` (or empty) keep their stored value; present
    /// fields overwrite. Concurrent writers therefore merge last-write-wins
    /// per field. An empty patch is rejected so no blank row is ever created.
    pub async fn upsert_artifacts(
        &self,
        material_id: MaterialId,
        patch: ArtifactPatch,
    ) -> Result<ArtifactSet> {
        let patch = patch.normalized();
        if patch.is_empty() {
            return Err(StudyAidError::validation("artifact patch has no values"));
        }

        let quiz_json = patch
            .quiz_questions
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StudyAidError::Storage(format!("encode quiz: {e}")))?;
        let concepts_json = patch
            .key_concepts
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StudyAidError::Storage(format!("encode concepts: {e}")))?;

        self.conn
            .execute(
                "INSERT INTO generated_data (id, material_id, summary, quiz_questions, key_concepts, generated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(material_id) DO UPDATE SET
                   summary = COALESCE(excluded.summary, generated_data.summary),
                   quiz_questions = COALESCE(excluded.quiz_questions, generated_data.quiz_questions),
                   key_concepts = COALESCE(excluded.key_concepts, generated_data.key_concepts),
                   generated_at = excluded.generated_at",
                params![
                    Uuid::now_v7().to_string(),
                    material_id.to_string(),
                    patch.summary.as_deref(),
                    quiz_json.as_deref(),
                    concepts_json.as_deref(),
                    now_rfc3339(),
                ],
            )
            .await
            .map_err(storage_err)?;

        tracing::debug!(
            %material_id,
            summary = patch.summary.is_some(),
            quiz = patch.quiz_questions.is_some(),
            concepts = patch.key_concepts.is_some(),
            "artifacts upserted"
        );

        self.get_artifacts(material_id)
            .await?
            .ok_or_else(|| StudyAidError::Storage("artifact row missing after upsert".into()))
    }
}

fn row_to_artifacts(row: &libsql::Row) -> Result<ArtifactSet> {
    let quiz_questions = match row.get::<String>(2).ok() {
        Some(json) => Some(
            serde_json::from_str::<Vec<Question>>(&json)
                .map_err(|e| StudyAidError::Storage(format!("decode quiz: {e}")))?,
        ),
        None => None,
    };
    let key_concepts = match row.get::<String>(3).ok() {
        Some(json) => Some(
            serde_json::from_str::<Vec<String>>(&json)
                .map_err(|e| StudyAidError::Storage(format!("decode concepts: {e}")))?,
        ),
        None => None,
    };

    Ok(ArtifactSet {
        material_id: parse_id(&row.get::<String>(0).map_err(storage_err)?)?,
        summary: row.get::<String>(1).ok(),
        quiz_questions,
        key_concepts,
        generated_at: parse_timestamp(&row.get::<String>(4).map_err(storage_err)?)?,
    })
}
