pub(crate) mod auth;
pub(crate) mod health;
pub(crate) mod llm;
pub(crate) mod materials;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use studyaid_shared::MaterialId;

use crate::error::ApiError;

/// Malformed ids cannot name an existing material.
pub(crate) fn material_id(raw: &str) -> Result<MaterialId, ApiError> {
    raw.parse().map_err(|_| ApiError::material_not_found())
}

/// [`Query`] whose rejection is an [`ApiError`] body.
pub(crate) struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(ApiError::new(rejection.status(), rejection.body_text())),
        }
    }
}
