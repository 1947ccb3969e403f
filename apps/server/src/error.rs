//! HTTP mapping for domain errors. Bodies are `{"detail": "..."}`.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use studyaid_shared::StudyAidError;

#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Could not validate credentials")
    }

    pub fn material_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Material not found")
    }
}

impl From<StudyAidError> for ApiError {
    fn from(err: StudyAidError) -> Self {
        use StudyAidError as E;
        match err {
            E::Validation { message } => Self::new(StatusCode::BAD_REQUEST, message),
            E::Conflict(message) => Self::new(StatusCode::BAD_REQUEST, message),
            E::NotFound(what) => Self::new(StatusCode::NOT_FOUND, format!("{what} not found")),
            E::Unauthorized(message) => Self::new(StatusCode::UNAUTHORIZED, message),
            E::Unavailable(what) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                format!("{what} is not configured"),
            ),
            E::Parse { message } => Self::new(StatusCode::BAD_REQUEST, message),
            other => {
                tracing::error!(error = %other, "request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(json!({ "detail": self.detail }))).into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

pub(crate) type ApiResult<T> = std::result::Result<T, ApiError>;
