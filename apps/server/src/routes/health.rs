use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};
use tracing::warn;

use crate::state::AppState;

pub(crate) async fn root() -> Json<Value> {
    Json(json!({ "message": "StudyAid API is running!" }))
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = match state.storage.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            warn!(error = %e, "database ping failed");
            "unavailable"
        }
    };
    Json(json!({
        "status": "healthy",
        "database": database,
        "storage": {
            "configured": state.blobs.is_configured(),
            "service": "supabase",
        },
    }))
}

pub(crate) async fn storage(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "storage_service": "supabase",
        "configuration": state.blobs.status(),
    }))
}
