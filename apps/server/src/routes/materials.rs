use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use studyaid_core::{MaterialWithArtifacts, Upload};
use studyaid_shared::Material;
use studyaid_storage::EnrichmentJob;

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::routes::{ApiQuery, material_id};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct UploadQuery {
    title: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TextMaterialRequest {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

pub(crate) async fn upload_material(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(query): ApiQuery<UploadQuery>,
    mut multipart: Multipart,
) -> ApiResult<Json<Material>> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.body_text()))?;
        upload = Some(Upload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let upload = upload.ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "File is required"))?;
    let material = state
        .materials
        .create_from_upload(&user, &query.title, upload)
        .await?;
    Ok(Json(material))
}

pub(crate) async fn upload_text(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<TextMaterialRequest>,
) -> ApiResult<Json<Material>> {
    let material = state
        .materials
        .create_from_text(&user, &req.title, &req.content)
        .await?;
    Ok(Json(material))
}

pub(crate) async fn history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<MaterialWithArtifacts>>> {
    Ok(Json(state.materials.history(&user).await?))
}

pub(crate) async fn get_material(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<MaterialWithArtifacts>> {
    let id = material_id(&id)?;
    Ok(Json(state.materials.get(&user, id).await?))
}

pub(crate) async fn delete_material(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = material_id(&id)?;
    state.materials.delete(&user, id).await?;
    Ok(Json(json!({ "message": "Material deleted successfully" })))
}

pub(crate) async fn download(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = material_id(&id)?;
    let url = state.materials.download_url(&user, id).await?;
    Ok(Json(json!({ "download_url": url })))
}

pub(crate) async fn enrichment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Option<EnrichmentJob>>> {
    let id = material_id(&id)?;
    Ok(Json(state.materials.enrichment_status(&user, id).await?))
}
