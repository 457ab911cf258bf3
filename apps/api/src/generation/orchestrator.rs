//! Generation orchestrator — keyword extraction, then two concurrent streams.
//!
//! Flow: validate → extract keywords (blocking, advisory) →
//!       stream cover letter ∥ stream profile → Complete | Failed.
//!
//! Every gateway failure after validation is logged in full and collapsed to
//! `ErrorKind::GenerationFailed` for the caller. Text already published stays.
//! A failing stream does not stop its sibling; only the cancellation token does.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::generation::keywords::extract_keywords;
use crate::generation::prompts::{
    build_cover_letter_prompt, build_profile_prompt, COVER_LETTER_SYSTEM, PROFILE_SYSTEM,
};
use crate::llm_client::{LlmError, LlmGateway};
use crate::models::request::GenerationRequest;
use crate::models::session::{
    ErrorKind, GenerationEvent, GenerationSession, SessionStatus, StreamingArtifact,
};

/// Receiving half is owned by the caller. A closed receiver never stops a generation.
pub type EventSink = mpsc::UnboundedSender<GenerationEvent>;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("CV and job description must both be provided")]
    MissingInput,

    #[error("Generation was cancelled")]
    Cancelled,
}

enum StreamFailure {
    Cancelled,
    Gateway,
}

// ────────────────────────────────────────────────────────────────────────────
// Event publishing
// ────────────────────────────────────────────────────────────────────────────

struct Publisher<'a> {
    events: &'a EventSink,
    session_id: Uuid,
    failed: AtomicBool,
}

impl<'a> Publisher<'a> {
    fn new(events: &'a EventSink, session_id: Uuid) -> Self {
        Self {
            events,
            session_id,
            failed: AtomicBool::new(false),
        }
    }

    fn send(&self, event: GenerationEvent) {
        // Nobody listening is fine: the generation runs to its end regardless.
        let _ = self.events.send(event);
    }

    fn status(&self, session: &mut GenerationSession, status: SessionStatus) {
        session.status = status;
        self.send(GenerationEvent::Status { status });
    }

    /// Logs the full cause and raises the generic error signal, once per session.
    fn gateway_failed(&self, step: &str, e: &LlmError) {
        error!(session_id = %self.session_id, step, error = %e, "Generation step failed");
        if !self.failed.swap(true, Ordering::SeqCst) {
            self.send(GenerationEvent::Status {
                status: SessionStatus::Failed,
            });
            self.send(GenerationEvent::error(ErrorKind::GenerationFailed));
        }
    }

    fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Orchestrator {
    llm: Arc<dyn LlmGateway>,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmGateway>) -> Self {
        Self { llm }
    }

    pub fn gateway(&self) -> &dyn LlmGateway {
        self.llm.as_ref()
    }

    /// Runs one generation, publishing progress on `events`.
    ///
    /// Returns `Err` only when nothing was generated: missing input (no gateway
    /// call is made) or cancellation. Gateway failures return the session with
    /// status `Failed` and whatever text had already streamed.
    pub async fn generate(
        &self,
        request: GenerationRequest,
        events: EventSink,
        cancel: CancellationToken,
    ) -> Result<GenerationSession, GenerationError> {
        if !request.has_required_input() {
            info!("Generation rejected: CV or job description is empty");
            let _ = events.send(GenerationEvent::error(ErrorKind::MissingInput));
            return Err(GenerationError::MissingInput);
        }

        let mut session = GenerationSession::new();
        let publisher = Publisher::new(&events, session.id);
        info!(
            session_id = %session.id,
            language = ?request.target_language,
            target_words = request.target_word_count.get(),
            "Generation started"
        );

        // Step 1: keywords. Malformed output is already absorbed by extract_keywords.
        publisher.status(&mut session, SessionStatus::ExtractingKeywords);
        let extracted = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(session.id)),
            result = extract_keywords(self.llm.as_ref(), &request.job_description) => result,
        };
        match extracted {
            Ok(keywords) => {
                info!(session_id = %session.id, count = keywords.len(), "Keywords extracted");
                session.keywords = keywords;
                publisher.send(GenerationEvent::Keywords {
                    keywords: session.keywords.clone(),
                });
            }
            Err(e) => {
                publisher.gateway_failed("keywords", &e);
                session.status = SessionStatus::Failed;
                session.error = Some(ErrorKind::GenerationFailed);
                return Ok(session);
            }
        }

        // Step 2: both streams start together and are joined.
        publisher.status(&mut session, SessionStatus::Streaming);
        let cover_prompt = build_cover_letter_prompt(&request, &session.keywords);
        let profile_prompt = build_profile_prompt(&request, &session.keywords);

        let (cover, profile) = tokio::join!(
            stream_artifact(
                self.llm.as_ref(),
                &cover_prompt,
                COVER_LETTER_SYSTEM,
                &mut session.cover_letter,
                &publisher,
                &cancel,
            ),
            stream_artifact(
                self.llm.as_ref(),
                &profile_prompt,
                PROFILE_SYSTEM,
                &mut session.short_profile,
                &publisher,
                &cancel,
            ),
        );

        // Step 3: join outcome.
        match (cover, profile) {
            (Ok(()), Ok(())) => {
                publisher.status(&mut session, SessionStatus::Complete);
                publisher.send(GenerationEvent::Complete);
                info!(
                    session_id = %session.id,
                    cover_letter_chars = session.cover_letter.text.len(),
                    profile_chars = session.short_profile.text.len(),
                    "Generation complete"
                );
                Ok(session)
            }
            // Once the error signal is out, the session is Failed even if the sibling
            // was cancelled afterwards.
            _ if publisher.has_failed() => {
                session.status = SessionStatus::Failed;
                session.error = Some(ErrorKind::GenerationFailed);
                Ok(session)
            }
            _ => Err(cancelled(session.id)),
        }
    }
}

fn cancelled(session_id: Uuid) -> GenerationError {
    info!(session_id = %session_id, "Generation cancelled");
    GenerationError::Cancelled
}

/// Drives one stream into its accumulator, republishing the full text after every fragment.
async fn stream_artifact(
    llm: &dyn LlmGateway,
    prompt: &str,
    system: &str,
    artifact: &mut StreamingArtifact,
    publisher: &Publisher<'_>,
    cancel: &CancellationToken,
) -> Result<(), StreamFailure> {
    let kind = artifact.kind;

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(StreamFailure::Cancelled),
        opened = llm.generate_stream(prompt, system) => opened,
    };
    let mut stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            publisher.gateway_failed(kind.as_str(), &e);
            return Err(StreamFailure::Gateway);
        }
    };

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StreamFailure::Cancelled),
            next = stream.next() => next,
        };
        match next {
            Some(Ok(fragment)) => {
                let text = artifact.push(&fragment).to_string();
                publisher.send(GenerationEvent::Artifact {
                    artifact: kind,
                    text,
                });
            }
            Some(Err(e)) => {
                publisher.gateway_failed(kind.as_str(), &e);
                return Err(StreamFailure::Gateway);
            }
            None => break,
        }
    }

    artifact.complete();
    publisher.send(GenerationEvent::ArtifactComplete { artifact: kind });
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
