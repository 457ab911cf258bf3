use std::sync::Arc;

use crate::generation::orchestrator::Orchestrator;
use crate::workspace::store::DraftStore;
use crate::workspace::WorkspaceHandle;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns the LLM gateway; every model call goes through it.
    pub orchestrator: Arc<Orchestrator>,
    pub workspace: WorkspaceHandle,
    pub drafts: Arc<dyn DraftStore>,
}
