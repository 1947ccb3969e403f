//! libSQL storage layer for StudyAid.
//!
//! The [`Storage`] struct wraps a local libSQL database holding users,
//! sessions, materials, generated artifacts and enrichment jobs.
//!
//! A `Storage` value owns one connection, shared by its clones. Background
//! work calls [`Storage::open_session`] to get its own connection to the same
//! database. Transactions never run on the shared connection; each one gets
//! a fresh connection from `write_transaction`.

mod artifacts;
mod jobs;
mod materials;
mod migrations;
mod users;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, Transaction, TransactionBehavior, params};
use studyaid_shared::{Result, StudyAidError};

pub use jobs::{EnrichmentJob, JobStatus};

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Primary storage handle wrapping a libSQL database.
#[derive(Clone)]
pub struct Storage {
    db: Arc<Database>,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StudyAidError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let db = Arc::new(db);
        let conn = connect(&db).await?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        tracing::debug!(path = %path.display(), "storage opened");
        Ok(storage)
    }

    /// A new handle with its own connection to the same database.
    pub async fn open_session(&self) -> Result<Self> {
        let conn = connect(&self.db).await?;
        Ok(Self {
            db: Arc::clone(&self.db),
            conn,
        })
    }

    /// Begin an IMMEDIATE transaction on a dedicated connection.
    ///
    /// The write lock is taken up front; contention waits out the busy
    /// timeout instead of failing on lock upgrade.
    pub(crate) async fn write_transaction(&self) -> Result<Transaction> {
        let conn = connect(&self.db).await?;
        conn.transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(storage_err)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    StudyAidError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Cheap liveness probe.
    pub async fn ping(&self) -> Result<()> {
        let mut rows = self.conn.query("SELECT 1", params![]).await.map_err(storage_err)?;
        rows.next().await.map_err(storage_err)?;
        Ok(())
    }
}

/// Connect and apply per-connection pragmas.
async fn connect(db: &Database) -> Result<Connection> {
    let conn = db.connect().map_err(storage_err)?;
    // PRAGMA statements that report a value must go through `query`.
    for pragma in [
        format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}"),
        "PRAGMA journal_mode = WAL".to_string(),
        "PRAGMA foreign_keys = ON".to_string(),
    ] {
        let mut rows = conn.query(&pragma, params![]).await.map_err(storage_err)?;
        while let Ok(Some(_)) = rows.next().await {}
    }
    Ok(conn)
}

pub(crate) fn storage_err(e: libsql::Error) -> StudyAidError {
    StudyAidError::Storage(e.to_string())
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StudyAidError::Storage(format!("invalid date {s:?}: {e}")))
}

pub(crate) fn parse_id<T: std::str::FromStr>(s: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    s.parse::<T>()
        .map_err(|e| StudyAidError::Storage(format!("invalid id {s:?}: {e}")))
}


#[cfg(test)]
mod tests {
    use super::test_support::test_storage;
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 2);
        storage.ping().await.expect("ping");
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("sa_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn session_handles_see_each_others_writes() {
        let storage = test_storage().await;
        let other = storage.open_session().await.expect("open session");

        let user = test_support::seed_user(&storage, "alice").await;
        let found = other.get_user(user.id).await.expect("get user");
        assert_eq!(found.map(|u| u.username).as_deref(), Some("alice"));
    }
}
