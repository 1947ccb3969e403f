//! Session extraction from `Authorization: Bearer` or the `access_token` cookie.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, header};
use studyaid_core::accounts;
use studyaid_shared::User;

use crate::error::ApiError;
use crate::state::AppState;

pub(crate) const SESSION_COOKIE: &str = "access_token";

/// The authenticated caller. Rejects with 401 when no valid session exists.
pub(crate) struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = presented_token(&parts.headers).ok_or_else(ApiError::unauthorized)?;
        match accounts::authenticate(&state.storage, &token).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => Err(ApiError::unauthorized()),
        }
    }
}

/// The raw session token, header first.
pub(crate) fn presented_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim_start_matches("Bearer ").to_string())
        .filter(|t| !t.is_empty())
}

/// `Set-Cookie` value for a new session.
pub(crate) fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Max-Age={max_age_secs}; Path=/; HttpOnly; SameSite=Lax"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that clears the session cookie.
pub(crate) fn cleared_cookie() -> String {
    format!("{SESSION_COOKIE}=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax")
}
