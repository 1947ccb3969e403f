//! User accounts and session tokens.

use chrono::{DateTime, Utc};
use libsql::params;
use studyaid_shared::{Result, StudyAidError, User, UserId};

use crate::{Storage, now_rfc3339, parse_id, parse_timestamp, storage_err};

const USER_COLUMNS: &str = "id, email, username, password_hash, is_active, created_at";

impl Storage {
    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    /// Insert a new user. Fails with `Conflict` when the email or username is taken.
    pub async fn create_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<User> {
        if self.user_exists(email, username).await? {
            return Err(StudyAidError::Conflict(
                "Email or username already registered".into(),
            ));
        }

        let id = UserId::new();
        let now = now_rfc3339();
        self.conn
            .execute(
                "INSERT INTO users (id, email, username, password_hash, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, 1, ?5)",
                params![id.to_string(), email, username, password_hash, now.as_str()],
            )
            .await
            .map_err(|e| {
                // Lost a race with a concurrent registration.
                if e.to_string().contains("UNIQUE") {
                    StudyAidError::Conflict("Email or username already registered".into())
                } else {
                    storage_err(e)
                }
            })?;

        tracing::info!(user_id = %id, "user created");
        Ok(User {
            id,
            email: email.to_string(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            is_active: true,
            created_at: parse_timestamp(&now)?,
        })
    }

    async fn user_exists(&self, email: &str, username: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM users WHERE email = ?1 OR username = ?2 LIMIT 1",
                params![email, username],
            )
            .await
            .map_err(storage_err)?;
        Ok(rows.next().await.map_err(storage_err)?.is_some())
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.query_user(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            id.to_string(),
        )
        .await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.query_user(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            email.to_string(),
        )
        .await
    }

    async fn query_user(&self, sql: &str, key: String) -> Result<Option<User>> {
        let mut rows = self
            .conn
            .query(sql, params![key])
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// Record a session by token hash.
    pub async fn create_session(
        &self,
        token_hash: &str,
        user_id: UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    token_hash,
                    user_id.to_string(),
                    now_rfc3339(),
                    expires_at.timestamp()
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Resolve an unexpired session to its active user.
    pub async fn find_session_user(&self, token_hash: &str) -> Result<Option<User>> {
        let mut rows = self
            .conn
            .query(
                "SELECT u.id, u.email, u.username, u.password_hash, u.is_active, u.created_at
                 FROM sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.token_hash = ?1 AND s.expires_at > ?2 AND u.is_active = 1",
                params![token_hash, Utc::now().timestamp()],
            )
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    /// Revoke a session. Returns whether a row was removed.
    pub async fn delete_session(&self, token_hash: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM sessions WHERE token_hash = ?1",
                params![token_hash],
            )
            .await
            .map_err(storage_err)?;
        Ok(removed > 0)
    }

    /// Drop expired sessions. Returns how many were removed.
    pub async fn purge_expired_sessions(&self) -> Result<u64> {
        self.conn
            .execute(
                "DELETE FROM sessions WHERE expires_at <= ?1",
                params![Utc::now().timestamp()],
            )
            .await
            .map_err(storage_err)
    }
}

fn row_to_user(row: &libsql::Row) -> Result<User> {
    Ok(User {
        id: parse_id(&row.get::<String>(0).map_err(storage_err)?)?,
        email: row.get::<String>(1).map_err(storage_err)?,
        username: row.get::<String>(2).map_err(storage_err)?,
        password_hash: row.get::<String>(3).map_err(storage_err)?,
        is_active: row.get::<i64>(4).map_err(storage_err)? != 0,
        created_at: parse_timestamp(&row.get::<String>(5).map_err(storage_err)?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::test_support::{seed_user, test_storage};
    use super::*;

    #[tokio::test]
    async fn user_create_and_lookup() {
        let storage = test_storage().await;
        let user = seed_user(&storage, "alice").await;

        let by_email = storage
            .get_user_by_email("alice@example.com")
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(by_email.id, user.id);
        assert!(by_email.is_active);

        assert!(storage.get_user(UserId::new()).await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn duplicate_email_or_username_conflicts() {
        let storage = test_storage().await;
        seed_user(&storage, "alice").await;

        let err = storage
            .create_user("alice@example.com", "someone-else", "h")
            .await
            .expect_err("duplicate email");
        assert!(matches!(err, StudyAidError::Conflict(_)));

        let err = storage
            .create_user("other@example.com", "alice", "h")
            .await
            .expect_err("duplicate username");
        assert!(matches!(err, StudyAidError::Conflict(_)));
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let storage = test_storage().await;
        let user = seed_user(&storage, "bob").await;

        storage
            .create_session("live", user.id, Utc::now() + Duration::minutes(30))
            .await
            .expect("create session");
        storage
            .create_session("stale", user.id, Utc::now() - Duration::minutes(1))
            .await
            .expect("create expired session");

        let found = storage.find_session_user("live").await.expect("find");
        assert_eq!(found.map(|u| u.id), Some(user.id));
        assert!(storage.find_session_user("stale").await.expect("find").is_none());
        assert!(storage.find_session_user("missing").await.expect("find").is_none());

        assert_eq!(storage.purge_expired_sessions().await.expect("purge"), 1);
        assert!(storage.delete_session("live").await.expect("delete"));
        assert!(!storage.delete_session("live").await.expect("delete again"));
        assert!(storage.find_session_user("live").await.expect("find").is_none());
    }
}
