mod config;
mod errors;
mod generation;
mod ingest;
mod llm_client;
mod models;
mod routes;
mod state;
mod workspace;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::generation::orchestrator::Orchestrator;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::workspace::store::{persist, spawn_autosave, DraftStore, JsonFileDraftStore};
use crate::workspace::Workspace;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Lettersmith API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(
        config.anthropic_api_key.clone(),
        config.anthropic_base_url.clone(),
    )?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    let orchestrator = Arc::new(Orchestrator::new(Arc::new(llm)));

    // Restore the last saved draft, if any
    let drafts = Arc::new(JsonFileDraftStore::new(config.draft_path.clone()));
    let workspace = match drafts.load().await {
        Ok(Some(snapshot)) => {
            info!("Restored draft from {}", drafts.path().display());
            Workspace::restore(snapshot)
        }
        Ok(None) => Workspace::new(),
        Err(e) => {
            warn!("Ignoring unreadable draft: {e:#}");
            Workspace::new()
        }
    }
    .into_handle();

    let drafts: Arc<dyn DraftStore> = drafts;
    let autosave = (config.autosave_secs > 0).then(|| {
        spawn_autosave(
            workspace.clone(),
            drafts.clone(),
            Duration::from_secs(config.autosave_secs),
        )
    });

    // Build app state
    let state = AppState {
        orchestrator,
        workspace: workspace.clone(),
        drafts: drafts.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the UI has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = autosave {
        handle.abort();
    }
    if persist(&workspace, drafts.as_ref()).await? {
        info!("Draft saved on shutdown");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
