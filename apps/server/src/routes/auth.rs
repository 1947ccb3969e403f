use axum::Json;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse};
use serde::Deserialize;
use serde_json::json;
use studyaid_core::accounts;
use studyaid_shared::{StudyAidError, User};
use tracing::warn;

use crate::auth::{CurrentUser, cleared_cookie, presented_token, session_cookie};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterRequest {
    email: String,
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    email: String,
    password: String,
}

pub(crate) async fn welcome() -> Json<&'static str> {
    Json("Welcome")
}

pub(crate) async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<User>> {
    let user = accounts::register(&state.storage, &req.email, &req.username, &req.password)
        .await
        .map_err(|e| match e {
            StudyAidError::Validation { message } => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, message)
            }
            other => other.into(),
        })?;
    Ok(Json(user))
}

pub(crate) async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let ttl = state.config.auth.token_ttl_minutes;
    let issued = accounts::login(&state.storage, &req.email, &req.password, ttl).await?;

    let cookie = session_cookie(&issued.access_token, ttl * 60, state.config.auth.cookie_secure);
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(json!({
            "access_token": issued.access_token,
            "token_type": "bearer",
        })),
    ))
}

pub(crate) async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

/// Revoke the presented session, if any, and clear the cookie.
pub(crate) async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = presented_token(&headers) {
        if let Err(e) = accounts::logout(&state.storage, &token).await {
            warn!(error = %e, "failed to revoke session");
        }
    }
    (
        AppendHeaders([(SET_COOKIE, cleared_cookie())]),
        Json(json!({ "message": "Successfully logged out" })),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{TestApp, json_request, read_json, request};
    use tower::ServiceExt;

    #[tokio::test]
    async fn register_login_me_logout() {
        let app = TestApp::default().await;
        let token = app.login("ada").await;

        let (status, body) = app.send(request("GET", "/auth/me", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "ada");
        assert!(body.get("password_hash").is_none());

        let (status, _) = app.send(request("POST", "/auth/logout", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app.send(request("GET", "/auth/me", Some(&token))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn login_sets_http_only_cookie_usable_for_auth() {
        let app = TestApp::default().await;
        app.login("ada").await;

        let response = app
            .router()
            .oneshot(json_request(
                "POST",
                "/auth/login",
                None,
                json!({ "email": "ada@example.com", "password": "hunter22" }),
            ))
            .await
            .expect("response");
        let cookie = response
            .headers()
            .get("set-cookie")
            .and_then(|v| v.to_str().ok())
            .expect("cookie")
            .to_string();
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=1800"));
        let (_, body) = read_json(response).await;
        assert_eq!(body["token_type"], "bearer");

        let pair = cookie.split(';').next().expect("pair").to_string();
        let req = axum::http::Request::builder()
            .uri("/auth/me")
            .header("cookie", pair)
            .body(axum::body::Body::empty())
            .expect("request");
        let (status, body) = app.send(req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "ada@example.com");
    }

    #[tokio::test]
    async fn registration_errors() {
        let app = TestApp::default().await;
        app.login("ada").await;

        let (status, body) = app
            .send(json_request(
                "POST",
                "/auth/register",
                None,
                json!({ "email": "ada@example.com", "username": "ada2", "password": "hunter22" }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Email or username already registered");

        let (status, _) = app
            .send(json_request(
                "POST",
                "/auth/register",
                None,
                json!({ "email": "bob@example.com", "username": "bo", "password": "hunter22" }),
            ))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn wrong_password_is_401() {
        let app = TestApp::default().await;
        app.login("ada").await;

        let (status, body) = app
            .send(json_request(
                "POST",
                "/auth/login",
                None,
                json!({ "email": "ada@example.com", "password": "nope!!" }),
            ))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["detail"], "Incorrect email or password");
    }

    #[tokio::test]
    async fn logout_without_session_is_ok() {
        let app = TestApp::default().await;
        let (status, body) = app.send(request("POST", "/auth/logout", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Successfully logged out");
    }
}
