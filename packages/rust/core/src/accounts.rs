//! Registration, login and session tokens.
//!
//! Passwords are stored as Argon2id PHC strings. Session tokens are random
//! URL-safe strings handed to the client once; only their SHA-256 digest is
//! persisted.

use std::sync::LazyLock;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use studyaid_shared::{Result, StudyAidError, User};
use studyaid_storage::Storage;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));

const USERNAME_CHARS: std::ops::RangeInclusive<usize> = 3..=50;
const PASSWORD_CHARS: std::ops::RangeInclusive<usize> = 6..=72;

const BAD_CREDENTIALS: &str = "Incorrect email or password";

/// A freshly issued session.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Validate and create an account.
#[instrument(skip_all, fields(username))]
pub async fn register(storage: &Storage, email: &str, username: &str, password: &str) -> Result<User> {
    let email = email.trim();
    let username = username.trim();
    validate_registration(email, username, password)?;

    let hash = hash_password(password.to_string()).await?;
    let user = storage.create_user(email, username, &hash).await?;
    info!(user_id = %user.id, "user registered");
    Ok(user)
}

/// Check credentials and issue a session token valid for `ttl_minutes`.
/// Sessions that have already expired are dropped first.
#[instrument(skip_all)]
pub async fn login(
    storage: &Storage,
    email: &str,
    password: &str,
    ttl_minutes: i64,
) -> Result<IssuedToken> {
    let Some(user) = storage.get_user_by_email(email.trim()).await? else {
        debug!("login for unknown email");
        return Err(StudyAidError::Unauthorized(BAD_CREDENTIALS.into()));
    };
    if !user.is_active {
        return Err(StudyAidError::Unauthorized(BAD_CREDENTIALS.into()));
    }
    if !verify_password(password.to_string(), user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "password mismatch");
        return Err(StudyAidError::Unauthorized(BAD_CREDENTIALS.into()));
    }

    match storage.purge_expired_sessions().await {
        Ok(0) => {}
        Ok(purged) => debug!(purged, "expired sessions removed"),
        Err(e) => warn!(error = %e, "session purge failed"),
    }

    let token = generate_token();
    let expires_at = Utc::now() + Duration::minutes(ttl_minutes);
    storage
        .create_session(&hash_token(&token), user.id, expires_at)
        .await?;

    info!(user_id = %user.id, "session issued");
    Ok(IssuedToken {
        access_token: token,
        expires_at,
    })
}

/// Resolve a presented token to its active user.
pub async fn authenticate(storage: &Storage, token: &str) -> Result<Option<User>> {
    if token.is_empty() {
        return Ok(None);
    }
    storage.find_session_user(&hash_token(token)).await
}

/// Revoke a session. Unknown tokens are not an error.
pub async fn logout(storage: &Storage, token: &str) -> Result<bool> {
    storage.delete_session(&hash_token(token)).await
}

fn validate_registration(email: &str, username: &str, password: &str) -> Result<()> {
    if !EMAIL_RE.is_match(email) {
        return Err(StudyAidError::validation("value is not a valid email address"));
    }
    if !USERNAME_CHARS.contains(&username.chars().count()) {
        return Err(StudyAidError::validation(
            "username must be between 3 and 50 characters",
        ));
    }
    if !PASSWORD_CHARS.contains(&password.chars().count()) {
        return Err(StudyAidError::validation(
            "password must be between 6 and 72 characters",
        ));
    }
    Ok(())
}

async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())
            .map_err(|e| StudyAidError::Storage(format!("salt: {e}")))?;
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| StudyAidError::Storage(format!("password hash: {e}")))
    })
    .await
    .map_err(|e| StudyAidError::Storage(format!("hash task: {e}")))?
}

async fn verify_password(password: String, stored: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        let Ok(parsed) = PasswordHash::new(&stored) else {
            // Unparseable hashes never match.
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
    .await
    .map_err(|e| StudyAidError::Storage(format!("verify task: {e}")))
}

fn generate_token() -> String {
    URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>())
}

/// Hex SHA-256 of a session token.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
