//! Draft persistence for the workspace.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::workspace::{WorkspaceHandle, WorkspaceSnapshot};

#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn load(&self) -> Result<Option<WorkspaceSnapshot>>;
    async fn save(&self, snapshot: &WorkspaceSnapshot) -> Result<()>;
}

/// Stores the snapshot as pretty JSON in a single file.
/// Writes go to a sibling temp file first and are renamed into place.
/// Saves are serialized: the temp file is shared, so only one writer may hold it.
pub struct JsonFileDraftStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileDraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DraftStore for JsonFileDraftStore {
    async fn load(&self) -> Result<Option<WorkspaceSnapshot>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read draft {}", self.path.display()))
            }
        };
        let snapshot = serde_json::from_slice(&raw)
            .with_context(|| format!("Draft {} is not a valid snapshot", self.path.display()))?;
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &WorkspaceSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_vec_pretty(snapshot).context("Failed to serialize draft")?;
        let _guard = self.write_lock.lock().await;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to move draft into {}", self.path.display()))?;

        debug!("Draft saved to {}", self.path.display());
        Ok(())
    }
}

/// Saves the workspace if it changed since the last save. Returns whether it wrote.
pub async fn persist(workspace: &WorkspaceHandle, store: &dyn DraftStore) -> Result<bool> {
    let snapshot = {
        let ws = workspace.lock().await;
        if !ws.is_dirty() {
            return Ok(false);
        }
        ws.snapshot()
    };

    store.save(&snapshot).await?;

    let mut ws = workspace.lock().await;
    // Only clear the flag if nothing changed while the file was being written.
    if ws.snapshot() == snapshot {
        ws.mark_persisted();
    }
    Ok(true)
}

/// Debounced autosave: every `every`, persist if dirty. Runs until the process exits.
pub fn spawn_autosave(
    workspace: WorkspaceHandle,
    store: Arc<dyn DraftStore>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    info!("Autosave enabled every {}s", every.as_secs());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = persist(&workspace, store.as_ref()).await {
                warn!("Autosave failed: {e:#}");
            }
        }
    })
}
