//! Route table and middleware.

use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::routes::{auth, health, llm, materials};
use crate::state::AppState;

/// Uploads larger than this are rejected before reaching a handler.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub(crate) fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/health/storage", get(health::storage))
        // Accounts
        .route("/auth/", get(auth::welcome))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        // Materials
        .route("/materials/upload-material", post(materials::upload_material))
        .route("/materials/upload-text", post(materials::upload_text))
        .route("/materials/get-history", get(materials::history))
        .route("/materials/download/:id", get(materials::download))
        .route("/materials/:id/enrichment", get(materials::enrichment))
        .route(
            "/materials/:id",
            get(materials::get_material).delete(materials::delete_material),
        )
        // On-demand generation
        .route("/llm/status", get(llm::status))
        .route("/llm/generate-summary/:id", post(llm::generate_summary))
        .route("/llm/generate-quiz/:id", post(llm::generate_quiz))
        .route("/llm/extract-concepts/:id", post(llm::extract_concepts))
        .route("/llm/analyze-material/:id", post(llm::analyze_material))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60))
}
