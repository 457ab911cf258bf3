pub mod health;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::generation::handlers as generation;
use crate::ingest;
use crate::state::AppState;
use crate::workspace::handlers as workspace;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Generation API
        .route("/api/v1/generate", post(generation::handle_generate))
        .route("/api/v1/keywords", post(generation::handle_extract_keywords))
        // Workspace API
        .route("/api/v1/workspace", get(workspace::handle_get_workspace))
        .route("/api/v1/workspace/inputs", put(workspace::handle_put_inputs))
        .route(
            "/api/v1/workspace/artifacts/:artifact",
            delete(workspace::handle_clear_artifact),
        )
        .route("/api/v1/workspace/persist", post(workspace::handle_persist))
        // CV upload
        .route("/api/v1/cv/extract", post(ingest::handle_extract_cv))
        .with_state(state)
}
