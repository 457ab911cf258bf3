//! Test double for `LlmGateway`: scripted keyword answers and streams, plus call counting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;
use tokio::sync::mpsc;

use crate::generation::prompts::{COVER_LETTER_SYSTEM, PROFILE_SYSTEM};
use crate::llm_client::{LlmError, LlmGateway, StructuredSchema, TextStream};
use crate::models::session::ArtifactKind;

/// What the structured (keyword) call answers.
pub enum StructuredReply {
    Raw(String),
    Fail,
}

/// What a streaming call for one artifact does.
pub enum StreamScript {
    Stream(TextStream),
    /// The request itself is rejected before any fragment.
    Refuse,
}

pub struct StubGateway {
    structured: StructuredReply,
    streams: Mutex<HashMap<ArtifactKind, StreamScript>>,
    calls: AtomicUsize,
}

impl StubGateway {
    pub fn new(keywords_json: &str) -> Self {
        Self {
            structured: StructuredReply::Raw(keywords_json.to_string()),
            streams: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_keywords() -> Self {
        Self {
            structured: StructuredReply::Fail,
            ..Self::new("")
        }
    }

    pub fn with_stream(self, kind: ArtifactKind, script: StreamScript) -> Self {
        self.streams
            .lock()
            .unwrap()
            .insert(kind, script);
        self
    }

    pub fn with_fragments(self, kind: ArtifactKind, fragments: &[&str]) -> Self {
        self.with_stream(kind, StreamScript::Stream(fragments_stream(fragments)))
    }

    /// Total number of gateway calls made, of either shape.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmGateway for StubGateway {
    async fn generate_structured(
        &self,
        _prompt: &str,
        _system: &str,
        _schema: &StructuredSchema,
    ) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.structured {
            StructuredReply::Raw(raw) => Ok(raw.clone()),
            StructuredReply::Fail => Err(LlmError::Api {
                status: 529,
                message: "Overloaded".to_string(),
            }),
        }
    }

    async fn generate_stream(&self, _prompt: &str, system: &str) -> Result<TextStream, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let kind = if system == COVER_LETTER_SYSTEM {
            ArtifactKind::CoverLetter
        } else if system == PROFILE_SYSTEM {
            ArtifactKind::ShortProfile
        } else {
            return Err(LlmError::Stream(format!("unexpected system prompt: {system}")));
        };

        let script = self.streams.lock().unwrap().remove(&kind);
        match script {
            Some(StreamScript::Stream(stream)) => Ok(stream),
            Some(StreamScript::Refuse) => Err(LlmError::Api {
                status: 400,
                message: "invalid request".to_string(),
            }),
            None => Ok(fragments_stream(&[])),
        }
    }
}

/// A stream that yields `fragments` then ends.
pub fn fragments_stream(fragments: &[&str]) -> TextStream {
    let items: Vec<Result<String, LlmError>> =
        fragments.iter().map(|f| Ok(f.to_string())).collect();
    Box::pin(stream::iter(items))
}

/// A stream that yields `fragments` then fails.
pub fn failing_stream(fragments: &[&str], message: &str) -> TextStream {
    let mut items: Vec<Result<String, LlmError>> =
        fragments.iter().map(|f| Ok(f.to_string())).collect();
    items.push(Err(LlmError::Stream(message.to_string())));
    Box::pin(stream::iter(items))
}

/// A stream driven by the test: items sent on the returned sender are yielded,
/// and dropping the sender ends the stream.
pub fn channel_stream() -> (mpsc::UnboundedSender<Result<String, LlmError>>, TextStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let stream = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    });
    (tx, Box::pin(stream))
}
