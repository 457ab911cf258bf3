//! Workspace — the server-side state the UI edits and renders.
//!
//! Mutations are in-memory only; nothing is written until `persist` is called
//! (explicitly or by the debounced autosave task).
//!
//! Late writes are guarded: every generation gets a ticket carrying the
//! generation id and the per-artifact epochs at trigger time. Events applied
//! with a stale ticket, or for an artifact cleared since, are dropped.

pub mod handlers;
pub mod store;

use std::num::NonZeroU32;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::models::request::{GenerationRequest, Language};
use crate::models::session::{
    ArtifactKind, ErrorKind, GenerationEvent, KeywordSet, SessionStatus,
};

pub type WorkspaceHandle = Arc<Mutex<Workspace>>;

pub const DEFAULT_WORD_COUNT: u32 = 250;

/// Text-box contents as the user last left them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceInputs {
    pub cv_text: String,
    pub job_description: String,
    pub target_language: Language,
    pub target_word_count: NonZeroU32,
}

impl Default for WorkspaceInputs {
    fn default() -> Self {
        Self {
            cv_text: String::new(),
            job_description: String::new(),
            target_language: Language::English,
            target_word_count: NonZeroU32::new(DEFAULT_WORD_COUNT).unwrap_or(NonZeroU32::MIN),
        }
    }
}

impl From<&GenerationRequest> for WorkspaceInputs {
    fn from(request: &GenerationRequest) -> Self {
        Self {
            cv_text: request.cv_text.clone(),
            job_description: request.job_description.clone(),
            target_language: request.target_language,
            target_word_count: request.target_word_count,
        }
    }
}

impl From<&WorkspaceInputs> for GenerationRequest {
    fn from(inputs: &WorkspaceInputs) -> Self {
        Self {
            cv_text: inputs.cv_text.clone(),
            job_description: inputs.job_description.clone(),
            target_language: inputs.target_language,
            target_word_count: inputs.target_word_count,
        }
    }
}

/// Serializable view of the workspace; also the persisted draft format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    pub inputs: WorkspaceInputs,
    pub keywords: KeywordSet,
    pub cover_letter: String,
    pub short_profile: String,
    pub status: SessionStatus,
    pub last_error: Option<ErrorKind>,
}

/// Issued by `begin_generation`; required to apply that generation's events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationTicket {
    generation: u64,
    cover_letter_epoch: u64,
    short_profile_epoch: u64,
}

#[derive(Debug, Default)]
pub struct Workspace {
    inputs: WorkspaceInputs,
    keywords: KeywordSet,
    cover_letter: String,
    short_profile: String,
    status: SessionStatus,
    last_error: Option<ErrorKind>,
    generation: u64,
    cover_letter_epoch: u64,
    short_profile_epoch: u64,
    in_flight: Option<CancellationToken>,
    dirty: bool,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restore(snapshot: WorkspaceSnapshot) -> Self {
        // A restored in-progress status has no generation behind it any more.
        let status = match snapshot.status {
            SessionStatus::ExtractingKeywords | SessionStatus::Streaming => SessionStatus::Idle,
            other => other,
        };
        Self {
            inputs: snapshot.inputs,
            keywords: snapshot.keywords,
            cover_letter: snapshot.cover_letter,
            short_profile: snapshot.short_profile,
            status,
            last_error: snapshot.last_error,
            ..Self::default()
        }
    }

    pub fn into_handle(self) -> WorkspaceHandle {
        Arc::new(Mutex::new(self))
    }

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            inputs: self.inputs.clone(),
            keywords: self.keywords.clone(),
            cover_letter: self.cover_letter.clone(),
            short_profile: self.short_profile.clone(),
            status: self.status,
            last_error: self.last_error,
        }
    }

    pub fn set_inputs(&mut self, inputs: WorkspaceInputs) {
        if self.inputs != inputs {
            self.inputs = inputs;
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_persisted(&mut self) {
        self.dirty = false;
    }

    /// Starts a new generation: supersedes (and cancels) any in-flight one,
    /// stores the inputs and resets the outputs.
    pub fn begin_generation(
        &mut self,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> GenerationTicket {
        if let Some(previous) = self.in_flight.replace(cancel) {
            previous.cancel();
        }
        self.generation += 1;
        self.set_inputs(WorkspaceInputs::from(request));
        self.keywords.clear();
        self.cover_letter.clear();
        self.short_profile.clear();
        self.status = SessionStatus::Idle;
        self.last_error = None;
        self.dirty = true;

        GenerationTicket {
            generation: self.generation,
            cover_letter_epoch: self.cover_letter_epoch,
            short_profile_epoch: self.short_profile_epoch,
        }
    }

    /// Applies one event of the generation identified by `ticket`.
    /// Returns false when the event was dropped as stale.
    pub fn apply(&mut self, ticket: &GenerationTicket, event: &GenerationEvent) -> bool {
        if ticket.generation != self.generation {
            debug!(
                ticket = ticket.generation,
                current = self.generation,
                "Dropping event from superseded generation"
            );
            return false;
        }

        match event {
            GenerationEvent::Status { status } => self.status = *status,
            GenerationEvent::Keywords { keywords } => self.keywords = keywords.clone(),
            GenerationEvent::Artifact { artifact, text } => {
                if !self.artifact_is_current(ticket, *artifact) {
                    debug!(artifact = artifact.as_str(), "Dropping fragment for cleared artifact");
                    return false;
                }
                *self.artifact_mut(*artifact) = text.clone();
            }
            GenerationEvent::ArtifactComplete { .. } => return true,
            GenerationEvent::Complete => {
                self.status = SessionStatus::Complete;
                self.in_flight = None;
            }
            GenerationEvent::Error { kind, .. } => {
                self.status = SessionStatus::Failed;
                self.last_error = Some(*kind);
            }
        }
        self.dirty = true;
        true
    }

    /// Marks the generation behind `ticket` as finished without a terminal event
    /// (e.g. cancelled). Releases its cancellation token if it is still current.
    pub fn finish_generation(&mut self, ticket: &GenerationTicket) {
        if ticket.generation == self.generation {
            self.in_flight = None;
            if matches!(
                self.status,
                SessionStatus::ExtractingKeywords | SessionStatus::Streaming
            ) {
                self.status = SessionStatus::Idle;
            }
        }
    }

    /// Empties one artifact. In-flight fragments for it are ignored from now on;
    /// the request itself keeps running.
    pub fn clear_artifact(&mut self, kind: ArtifactKind) {
        match kind {
            ArtifactKind::CoverLetter => self.cover_letter_epoch += 1,
            ArtifactKind::ShortProfile => self.short_profile_epoch += 1,
        }
        self.artifact_mut(kind).clear();
        self.dirty = true;
    }

    fn artifact_is_current(&self, ticket: &GenerationTicket, kind: ArtifactKind) -> bool {
        match kind {
            ArtifactKind::CoverLetter => ticket.cover_letter_epoch == self.cover_letter_epoch,
            ArtifactKind::ShortProfile => ticket.short_profile_epoch == self.short_profile_epoch,
        }
    }

    fn artifact_mut(&mut self, kind: ArtifactKind) -> &mut String {
        match kind {
            ArtifactKind::CoverLetter => &mut self.cover_letter,
            ArtifactKind::ShortProfile => &mut self.short_profile,
        }
    }
}
