//! Synchronous generation for one material. Errors reach the caller.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};
use studyaid_core::regenerate::{AnalysisResult, ConceptsResult, QuizResult, SummaryResult};
use studyaid_core::{AnalysisParams, Regenerator};

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::routes::{ApiQuery, material_id};
use crate::state::AppState;

fn default_summary_length() -> usize {
    300
}

fn default_mcq() -> usize {
    8
}

fn default_short() -> usize {
    4
}

fn default_concepts() -> usize {
    10
}

#[derive(Debug, Deserialize)]
pub(crate) struct SummaryQuery {
    #[serde(default = "default_summary_length")]
    max_length: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuizQuery {
    #[serde(default = "default_mcq")]
    num_mcq: usize,
    #[serde(default = "default_short")]
    num_short: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConceptsQuery {
    #[serde(default = "default_concepts")]
    max_concepts: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnalysisQuery {
    #[serde(default = "default_summary_length")]
    max_summary_length: usize,
    #[serde(default = "default_mcq")]
    num_mcq: usize,
    #[serde(default = "default_short")]
    num_short: usize,
    #[serde(default = "default_concepts")]
    max_concepts: usize,
}

fn regenerator(state: &AppState) -> Regenerator<'_> {
    Regenerator::new(
        &state.storage,
        state.generator.as_ref(),
        state.config.enrichment.max_content_chars,
    )
}

pub(crate) async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "configured": state.generator.is_available(),
        "model": state.generator.model(),
    }))
}

pub(crate) async fn generate_summary(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    ApiQuery(q): ApiQuery<SummaryQuery>,
) -> ApiResult<Json<SummaryResult>> {
    let id = material_id(&id)?;
    Ok(Json(regenerator(&state).summary(user.id, id, q.max_length).await?))
}

pub(crate) async fn generate_quiz(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    ApiQuery(q): ApiQuery<QuizQuery>,
) -> ApiResult<Json<QuizResult>> {
    let id = material_id(&id)?;
    Ok(Json(
        regenerator(&state)
            .quiz(user.id, id, q.num_mcq, q.num_short)
            .await?,
    ))
}

pub(crate) async fn extract_concepts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    ApiQuery(q): ApiQuery<ConceptsQuery>,
) -> ApiResult<Json<ConceptsResult>> {
    let id = material_id(&id)?;
    Ok(Json(
        regenerator(&state)
            .key_concepts(user.id, id, q.max_concepts)
            .await?,
    ))
}

pub(crate) async fn analyze_material(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    ApiQuery(q): ApiQuery<AnalysisQuery>,
) -> ApiResult<Json<AnalysisResult>> {
    let id = material_id(&id)?;
    let params = AnalysisParams {
        max_summary_length: q.max_summary_length,
        num_mcq: q.num_mcq,
        num_short: q.num_short,
        max_concepts: q.max_concepts,
    };
    Ok(Json(regenerator(&state).analyze(user.id, id, params).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use studyaid_core::testing::{FakeBlobStore, FakeGenerator, Reply};

    use crate::routes::test_support::{CONTENT, TestApp, request};

    #[tokio::test]
    async fn status_reports_model() {
        let app = TestApp::default().await;
        let (status, body) = app.send(request("GET", "/llm/status", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["configured"], true);
        assert_eq!(body["model"], "fake-model");
    }

    #[tokio::test]
    async fn summary_endpoint_persists_result() {
        let generator = FakeGenerator::available().with_summary(Reply::Value("Cells make ATP.".into()));
        let app = TestApp::new(generator, FakeBlobStore::configured()).await;
        let token = app.login("ada").await;
        let id = app.upload_text(&token, "Cells", CONTENT).await;

        let (status, body) = app
            .send(request("POST", &format!("/llm/generate-summary/{id}?max_length=100"), Some(&token)))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["summary"], "Cells make ATP.");
        assert_eq!(body["word_count"], 3);
        assert_eq!(body["material_title"], "Cells");
    }

    #[tokio::test]
    async fn out_of_range_parameters_are_400() {
        let app = TestApp::default().await;
        let token = app.login("ada").await;
        let id = app.upload_text(&token, "Cells", CONTENT).await;

        for uri in [
            format!("/llm/generate-quiz/{id}?num_mcq=51"),
            format!("/llm/generate-quiz/{id}?num_short=0"),
            format!("/llm/extract-concepts/{id}?max_concepts=0"),
            format!("/llm/generate-summary/{id}?max_length=10"),
        ] {
            let (status, _) = app.send(request("POST", &uri, Some(&token))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn malformed_query_is_json_400() {
        let app = TestApp::default().await;
        let token = app.login("ada").await;
        let id = app.upload_text(&token, "Cells", CONTENT).await;

        let (status, body) = app
            .send(request(
                "POST",
                &format!("/llm/generate-quiz/{id}?num_mcq=abc"),
                Some(&token),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(
            body["detail"]
                .as_str()
                .is_some_and(|d| d.starts_with("Failed to deserialize query string")),
            "{body}"
        );
    }

    #[tokio::test]
    async fn unavailable_generator_is_503() {
        let app = TestApp::new(FakeGenerator::unavailable(), FakeBlobStore::configured()).await;
        let token = app.login("ada").await;
        let id = app.upload_text(&token, "Cells", CONTENT).await;

        let (status, body) = app
            .send(request("POST", &format!("/llm/extract-concepts/{id}"), Some(&token)))
            .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["detail"], "LLM service is not configured");
    }

    #[tokio::test]
    async fn generation_failure_is_500() {
        let generator = FakeGenerator::available().with_quiz(Reply::Fail);
        let app = TestApp::new(generator, FakeBlobStore::configured()).await;
        let token = app.login("ada").await;
        let id = app.upload_text(&token, "Cells", CONTENT).await;

        let (status, _) = app
            .send(request("POST", &format!("/llm/generate-quiz/{id}"), Some(&token)))
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn analysis_counts_successes() {
        let generator = FakeGenerator::available().with_concepts(Reply::Fail);
        let app = TestApp::new(generator, FakeBlobStore::configured()).await;
        let token = app.login("ada").await;
        let id = app.upload_text(&token, "Cells", CONTENT).await;

        let (status, body) = app
            .send(request("POST", &format!("/llm/analyze-material/{id}"), Some(&token)))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["success_count"], 2);
        assert_eq!(body["total_operations"], 3);
        assert!(body["analysis_results"].get("key_concepts").is_none());
        assert_eq!(body["errors"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn unknown_material_is_404() {
        let app = TestApp::default().await;
        let token = app.login("ada").await;
        let (status, body) = app
            .send(request(
                "POST",
                "/llm/generate-summary/0190b7a4-0000-7000-8000-000000000000",
                Some(&token),
            ))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Material not found");
    }
}
