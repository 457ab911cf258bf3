use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::session::ArtifactKind;
use crate::state::AppState;
use crate::workspace::store::persist;
use crate::workspace::{WorkspaceInputs, WorkspaceSnapshot};

#[derive(Debug, Serialize)]
pub struct PersistResponse {
    /// False when nothing had changed since the last save.
    pub written: bool,
}

/// GET /api/v1/workspace
pub async fn handle_get_workspace(State(state): State<AppState>) -> Json<WorkspaceSnapshot> {
    Json(state.workspace.lock().await.snapshot())
}

/// PUT /api/v1/workspace/inputs
pub async fn handle_put_inputs(
    State(state): State<AppState>,
    Json(inputs): Json<WorkspaceInputs>,
) -> Json<WorkspaceSnapshot> {
    let mut ws = state.workspace.lock().await;
    ws.set_inputs(inputs);
    Json(ws.snapshot())
}

/// DELETE /api/v1/workspace/artifacts/:artifact
///
/// Clears one generated document. A generation still streaming into it will
/// not write to it again.
pub async fn handle_clear_artifact(
    State(state): State<AppState>,
    Path(artifact): Path<ArtifactKind>,
) -> StatusCode {
    state.workspace.lock().await.clear_artifact(artifact);
    StatusCode::NO_CONTENT
}

/// POST /api/v1/workspace/persist
pub async fn handle_persist(
    State(state): State<AppState>,
) -> Result<Json<PersistResponse>, AppError> {
    let written = persist(&state.workspace, state.drafts.as_ref()).await?;
    Ok(Json(PersistResponse { written }))
}
