//! SQL migration definitions for the StudyAid database.
//!
//! Migrations are forward-only and applied in order on database open.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: users, sessions, materials, generated_data",
            sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,
    username      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    is_active     INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL
);

-- Only the SHA-256 of a session token is stored.
CREATE TABLE IF NOT EXISTS sessions (
    token_hash TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);

CREATE TABLE IF NOT EXISTS materials (
    id           TEXT PRIMARY KEY,
    title        TEXT NOT NULL,
    content      TEXT NOT NULL,
    content_type TEXT NOT NULL,
    file_url     TEXT,
    user_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_materials_user ON materials(user_id, created_at);

-- At most one artifact row per material; quiz and concepts are JSON arrays.
CREATE TABLE IF NOT EXISTS generated_data (
    id             TEXT PRIMARY KEY,
    material_id    TEXT NOT NULL UNIQUE REFERENCES materials(id) ON DELETE CASCADE,
    summary        TEXT,
    quiz_questions TEXT,
    key_concepts   TEXT,
    generated_at   TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Durable enrichment job tracking",
            sql: r#"
CREATE TABLE IF NOT EXISTS enrichment_jobs (
    id          TEXT PRIMARY KEY,
    material_id TEXT NOT NULL REFERENCES materials(id) ON DELETE CASCADE,
    status      TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    detail      TEXT
);

CREATE INDEX IF NOT EXISTS idx_enrichment_jobs_material ON enrichment_jobs(material_id, started_at);

-- One running job per material.
CREATE UNIQUE INDEX IF NOT EXISTS idx_enrichment_jobs_running
    ON enrichment_jobs(material_id) WHERE status = 'running';

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_ascending_and_recorded() {
        let migrations = all_migrations();
        for pair in migrations.windows(2) {
            assert!(pair[0].version < pair[1].version);
        }
        for m in &migrations {
            let marker = format!("INSERT INTO schema_migrations (version) VALUES ({});", m.version);
            assert!(m.sql.contains(&marker), "migration {} not recorded", m.version);
        }
    }
}
