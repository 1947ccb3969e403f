//! Durable enrichment job records.
//!
//! A job row is claimed before a background run starts and finished with a
//! terminal status afterwards. Rows still `running` when the process starts
//! belong to a run that never finished.

use chrono::{DateTime, Utc};
use libsql::params;
use serde::Serialize;
use studyaid_shared::{MaterialId, Result, StudyAidError};
use uuid::Uuid;

use crate::{Storage, now_rfc3339, parse_id, parse_timestamp, storage_err};

/// Lifecycle state of an enrichment job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    /// Every artifact was produced.
    Succeeded,
    /// Some artifacts were produced.
    Partial,
    /// Nothing was produced or persisting failed.
    Failed,
    /// Preconditions were not met.
    Skipped,
    /// The process stopped while the job was running.
    Interrupted,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Interrupted => "interrupted",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = StudyAidError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "running" => Self::Running,
            "succeeded" => Self::Succeeded,
            "partial" => Self::Partial,
            "failed" => Self::Failed,
            "skipped" => Self::Skipped,
            "interrupted" => Self::Interrupted,
            other => return Err(StudyAidError::parse(format!("unknown job status: {other}"))),
        })
    }
}

/// One enrichment attempt for a material.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentJob {
    pub id: String,
    pub material_id: MaterialId,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub detail: Option<String>,
}

impl Storage {
    /// Claim a running job for `material_id`.
    ///
    /// Returns `None` when another job for the same material is still running.
    pub async fn claim_enrichment_job(&self, material_id: MaterialId) -> Result<Option<String>> {
        let id = Uuid::now_v7().to_string();
        let inserted = self
            .conn
            .execute(
                "INSERT INTO enrichment_jobs (id, material_id, status, started_at)
                 SELECT ?1, ?2, 'running', ?3
                 WHERE NOT EXISTS (
                     SELECT 1 FROM enrichment_jobs WHERE material_id = ?2 AND status = 'running'
                 )",
                params![id.as_str(), material_id.to_string(), now_rfc3339()],
            )
            .await
            .map_err(|e| {
                // The partial unique index caught a concurrent claim.
                if e.to_string().contains("UNIQUE") {
                    None
                } else {
                    Some(storage_err(e))
                }
            });

        match inserted {
            Ok(0) | Err(None) => Ok(None),
            Ok(_) => Ok(Some(id)),
            Err(Some(e)) => Err(e),
        }
    }

    /// Record the terminal status of a job.
    pub async fn finish_enrichment_job(
        &self,
        job_id: &str,
        status: JobStatus,
        detail: Option<&str>,
    ) -> Result<()> {
        self.conn
            .execute(
                "UPDATE enrichment_jobs SET status = ?1, finished_at = ?2, detail = ?3 WHERE id = ?4",
                params![status.as_str(), now_rfc3339(), detail, job_id],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Most recent job for a material.
    pub async fn latest_enrichment_job(
        &self,
        material_id: MaterialId,
    ) -> Result<Option<EnrichmentJob>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, material_id, status, started_at, finished_at, detail
                 FROM enrichment_jobs WHERE material_id = ?1
                 ORDER BY started_at DESC, id DESC LIMIT 1",
                params![material_id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_job(&row)?)),
            None => Ok(None),
        }
    }

    /// Mark every `running` job as interrupted and return the affected materials.
    pub async fn interrupt_running_jobs(&self) -> Result<Vec<MaterialId>> {
        let tx = self.write_transaction().await?;

        let mut rows = tx
            .query(
                "SELECT DISTINCT material_id FROM enrichment_jobs WHERE status = 'running'",
                params![],
            )
            .await
            .map_err(storage_err)?;
        let mut materials = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            materials.push(parse_id::<MaterialId>(
                &row.get::<String>(0).map_err(storage_err)?,
            )?);
        }
        drop(rows);

        tx.execute(
            "UPDATE enrichment_jobs SET status = 'interrupted', finished_at = ?1
             WHERE status = 'running'",
            params![now_rfc3339()],
        )
        .await
        .map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;

        if !materials.is_empty() {
            tracing::warn!(count = materials.len(), "marked unfinished enrichment jobs interrupted");
        }
        Ok(materials)
    }
}

fn row_to_job(row: &libsql::Row) -> Result<EnrichmentJob> {
    Ok(EnrichmentJob {
        id: row.get::<String>(0).map_err(storage_err)?,
        material_id: parse_id(&row.get::<String>(1).map_err(storage_err)?)?,
        status: row.get::<String>(2).map_err(storage_err)?.parse()?,
        started_at: parse_timestamp(&row.get::<String>(3).map_err(storage_err)?)?,
        finished_at: match row.get::<String>(4).ok() {
            Some(s) => Some(parse_timestamp(&s)?),
            None => None,
        },
        detail: row.get::<String>(5).ok(),
    })
}
