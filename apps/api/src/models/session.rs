use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Keywords in the relevance order the model returned them.
pub type KeywordSet = Vec<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    CoverLetter,
    ShortProfile,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::CoverLetter => "cover_letter",
            ArtifactKind::ShortProfile => "short_profile",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactState {
    #[default]
    Empty,
    Streaming,
    Complete,
}

/// Accumulates the fragments of one streamed document in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingArtifact {
    pub kind: ArtifactKind,
    pub text: String,
    pub state: ArtifactState,
}

impl StreamingArtifact {
    pub fn new(kind: ArtifactKind) -> Self {
        Self {
            kind,
            text: String::new(),
            state: ArtifactState::Empty,
        }
    }

    /// Appends a fragment and returns the accumulated text.
    pub fn push(&mut self, fragment: &str) -> &str {
        self.state = ArtifactState::Streaming;
        self.text.push_str(fragment);
        &self.text
    }

    pub fn complete(&mut self) {
        self.state = ArtifactState::Complete;
    }

}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    ExtractingKeywords,
    Streaming,
    Complete,
    Failed,
}

/// User-facing error categories. Sub-causes are deliberately not distinguished here;
/// the detail lives in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    MissingInput,
    ExtractionMalformed,
    GenerationFailed,
}

impl ErrorKind {
    /// Localisation key the UI resolves to a message.
    pub fn message_key(self) -> &'static str {
        match self {
            ErrorKind::MissingInput => "error.missingInput",
            ErrorKind::ExtractionMalformed => "error.extractionMalformed",
            ErrorKind::GenerationFailed => "error.generationFailed",
        }
    }
}

/// One end-to-end generation attempt. Transient: replaced on the next trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSession {
    pub id: Uuid,
    pub keywords: KeywordSet,
    pub cover_letter: StreamingArtifact,
    pub short_profile: StreamingArtifact,
    pub status: SessionStatus,
    pub error: Option<ErrorKind>,
    pub started_at: DateTime<Utc>,
}

impl GenerationSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            keywords: Vec::new(),
            cover_letter: StreamingArtifact::new(ArtifactKind::CoverLetter),
            short_profile: StreamingArtifact::new(ArtifactKind::ShortProfile),
            status: SessionStatus::Idle,
            error: None,
            started_at: Utc::now(),
        }
    }
}

impl Default for GenerationSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress notifications published while a generation runs.
///
/// `Artifact` always carries the full accumulated text, not the fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    Status { status: SessionStatus },
    Keywords { keywords: KeywordSet },
    Artifact { artifact: ArtifactKind, text: String },
    ArtifactComplete { artifact: ArtifactKind },
    Complete,
    Error { kind: ErrorKind, message_key: String },
}

impl GenerationEvent {
    pub fn error(kind: ErrorKind) -> Self {
        GenerationEvent::Error {
            kind,
            message_key: kind.message_key().to_string(),
        }
    }

    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            GenerationEvent::Status { .. } => "status",
            GenerationEvent::Keywords { .. } => "keywords",
            GenerationEvent::Artifact { .. } => "artifact",
            GenerationEvent::ArtifactComplete { .. } => "artifact_complete",
            GenerationEvent::Complete => "complete",
            GenerationEvent::Error { .. } => "error",
        }
    }
}
