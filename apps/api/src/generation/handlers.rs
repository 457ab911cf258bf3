//! Axum route handlers for the Generation API.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::AppError;
use crate::generation::keywords::extract_keywords;
use crate::models::request::GenerationRequest;
use crate::models::session::{GenerationEvent, KeywordSet};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct KeywordsRequest {
    pub job_description: String,
}

#[derive(Debug, Serialize)]
pub struct KeywordsResponse {
    pub keywords: KeywordSet,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/generate
///
/// Starts a generation and streams its events as SSE (`event:` = event type,
/// `data:` = event JSON). The generation is owned by the server: a client that
/// disconnects stops receiving events, the workspace keeps receiving them.
/// Triggering again supersedes the previous generation.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerationRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    if !request.has_required_input() {
        return Err(AppError::MissingInput);
    }

    let cancel = CancellationToken::new();
    let ticket = state
        .workspace
        .lock()
        .await
        .begin_generation(&request, cancel.clone());

    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<GenerationEvent>();
    let (client_tx, mut client_rx) = mpsc::unbounded_channel::<GenerationEvent>();

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        match orchestrator.generate(request, events_tx, cancel).await {
            Ok(session) => info!(
                session_id = %session.id,
                status = ?session.status,
                "Generation finished"
            ),
            Err(e) => info!("Generation ended without output: {e}"),
        }
    });

    // Workspace first, then the client: the stored state is never behind what was shown.
    let workspace = state.workspace.clone();
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            workspace.lock().await.apply(&ticket, &event);
            let _ = client_tx.send(event);
        }
        workspace.lock().await.finish_generation(&ticket);
    });

    let stream = async_stream::stream! {
        while let Some(event) = client_rx.recv().await {
            yield Event::default().event(event.name()).json_data(&event);
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// POST /api/v1/keywords
///
/// Runs only the keyword-extraction step. Useful for previewing what the
/// generation will be guided by.
pub async fn handle_extract_keywords(
    State(state): State<AppState>,
    Json(request): Json<KeywordsRequest>,
) -> Result<Json<KeywordsResponse>, AppError> {
    if request.job_description.trim().is_empty() {
        return Err(AppError::MissingInput);
    }

    let keywords = extract_keywords(state.orchestrator.gateway(), &request.job_description)
        .await
        .map_err(|e| AppError::Llm(format!("Keyword extraction failed: {e}")))?;

    Ok(Json(KeywordsResponse { keywords }))
}
