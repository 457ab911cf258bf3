/// LLM Client — the single point of entry for all Claude API calls in Lettersmith.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// Callers depend on the `LlmGateway` trait; `LlmClient` is the production implementation.
///
/// Model: claude-sonnet-4-5 (hardcoded — do not make configurable to prevent drift)
use std::pin::Pin;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;
pub mod sse;
#[cfg(test)]
pub mod stub;

use sse::{SseDecoder, SseEvent};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const MESSAGES_PATH: &str = "/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls in Lettersmith.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Ordered text fragments of one streaming generation.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// JSON schema handed to the model for a structured (single-shot) call.
#[derive(Debug, Clone)]
pub struct StructuredSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: Value,
}

/// The two call shapes the generation pipeline needs from a text-generation service.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Single-shot call constrained to `schema`. Returns the raw JSON text;
    /// interpreting (and tolerating) it is the caller's concern.
    async fn generate_structured(
        &self,
        prompt: &str,
        system: &str,
        schema: &StructuredSchema,
    ) -> Result<String, LlmError>;

    /// Streaming call. Fragments arrive in generation order; the stream ends
    /// when the model finishes the message.
    async fn generate_stream(&self, prompt: &str, system: &str) -> Result<TextStream, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct AnthropicTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
    pub name: Option<String>,
    pub input: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }

    /// Returns the input object of the named tool call, if the model made one.
    pub fn tool_input(&self, tool: &str) -> Option<&Value> {
        self.content
            .iter()
            .find(|b| b.block_type == "tool_use" && b.name.as_deref() == Some(tool))
            .and_then(|b| b.input.as_ref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// What one SSE event of a streaming response means to the caller.
#[derive(Debug, PartialEq, Eq)]
enum StreamSignal {
    Text(String),
    Stop,
    Ignore,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// The single LLM client used by all services in Lettersmith.
/// One attempt per call: failures are reported, never retried.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl LlmClient {
    pub fn new(api_key: String, base_url: impl Into<String>) -> Result<Self, LlmError> {
        // No overall timeout: a long stream is not a failure. Only connecting is bounded.
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn messages_url(&self) -> String {
        format!("{}{MESSAGES_PATH}", self.base_url)
    }

    async fn send(&self, body: &AnthropicRequest<'_>) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API returned {}: {}", status, body);
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    /// Sends a non-streaming request and decodes the full response object.
    async fn finish_call(&self, body: &AnthropicRequest<'_>) -> Result<LlmResponse, LlmError> {
        let llm_response: LlmResponse = self.send(body).await?.json().await?;

        debug!(
            "LLM call succeeded: input_tokens={}, output_tokens={}",
            llm_response.usage.input_tokens, llm_response.usage.output_tokens
        );

        Ok(llm_response)
    }
}

#[async_trait]
impl LlmGateway for LlmClient {
    async fn generate_structured(
        &self,
        prompt: &str,
        system: &str,
        schema: &StructuredSchema,
    ) -> Result<String, LlmError> {
        // Forced tool use is how the Messages API constrains output to a schema.
        let body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
            tools: Some(vec![AnthropicTool {
                name: schema.name,
                description: schema.description,
                input_schema: &schema.schema,
            }]),
            tool_choice: Some(serde_json::json!({ "type": "tool", "name": schema.name })),
            stream: false,
        };

        let response = self.finish_call(&body).await?;

        if let Some(input) = response.tool_input(schema.name) {
            return Ok(input.to_string());
        }
        response
            .text()
            .map(|t| strip_json_fences(t).to_string())
            .ok_or(LlmError::EmptyContent)
    }

    async fn generate_stream(&self, prompt: &str, system: &str) -> Result<TextStream, LlmError> {
        let body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
            tools: None,
            tool_choice: None,
            stream: true,
        };

        let bytes = self.send(&body).await?.bytes_stream();
        Ok(Box::pin(text_fragments(bytes)))
    }
}

/// Turns the raw SSE byte stream of a streaming Messages call into text fragments.
/// Ending without `message_stop` is an error: the message was cut short.
fn text_fragments<S, B, E>(bytes: S) -> impl Stream<Item = Result<String, LlmError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<LlmError> + Send,
{
    try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut decoder = SseDecoder::new();
        let mut finished = false;

        'read: while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(Into::<LlmError>::into)?;
            for event in decoder.push(chunk.as_ref()) {
                match classify_stream_event(&event)? {
                    StreamSignal::Text(text) => yield text,
                    StreamSignal::Stop => {
                        finished = true;
                        break 'read;
                    }
                    StreamSignal::Ignore => {}
                }
            }
        }

        if !finished {
            let reason = if decoder.has_pending() {
                "stream ended in the middle of an event"
            } else {
                "stream ended before message_stop"
            };
            Err::<(), _>(LlmError::Stream(reason.to_string()))?;
        }
    }
}

/// Maps one Messages API stream event onto text, end-of-message, or nothing.
/// `error` events become `LlmError::Stream`.
fn classify_stream_event(event: &SseEvent) -> Result<StreamSignal, LlmError> {
    if event.data.trim().is_empty() {
        return Ok(StreamSignal::Ignore);
    }

    let payload: Value = serde_json::from_str(&event.data)
        .map_err(|e| LlmError::Stream(format!("malformed stream event: {e}")))?;
    let kind = event
        .event
        .as_deref()
        .or_else(|| payload["type"].as_str())
        .unwrap_or_default();

    match kind {
        "content_block_delta" => {
            if payload["delta"]["type"] == "text_delta" {
                match payload["delta"]["text"].as_str() {
                    Some(text) if !text.is_empty() => Ok(StreamSignal::Text(text.to_string())),
                    _ => Ok(StreamSignal::Ignore),
                }
            } else {
                Ok(StreamSignal::Ignore)
            }
        }
        "message_stop" => Ok(StreamSignal::Stop),
        "error" => Err(LlmError::Stream(
            payload["error"]["message"]
                .as_str()
                .unwrap_or("unknown stream error")
                .to_string(),
        )),
        _ => Ok(StreamSignal::Ignore),
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str, data: &str) -> SseEvent {
        SseEvent {
            event: Some(name.to_string()),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_text_delta_yields_text() {
        let ev = event(
            "content_block_delta",
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Dear"}}"#,
        );
        assert_eq!(
            classify_stream_event(&ev).unwrap(),
            StreamSignal::Text("Dear".to_string())
        );
    }

    #[test]
    fn test_message_stop_ends_stream() {
        let ev = event("message_stop", r#"{"type":"message_stop"}"#);
        assert_eq!(classify_stream_event(&ev).unwrap(), StreamSignal::Stop);
    }

    #[test]
    fn test_bookkeeping_events_are_ignored() {
        for name in ["message_start", "content_block_start", "ping", "message_delta"] {
            let ev = event(name, &format!(r#"{{"type":"{name}"}}"#));
            assert_eq!(classify_stream_event(&ev).unwrap(), StreamSignal::Ignore);
        }
    }

    #[test]
    fn test_error_event_is_stream_error() {
        let ev = event(
            "error",
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        );
        match classify_stream_event(&ev) {
            Err(LlmError::Stream(msg)) => assert_eq!(msg, "Overloaded"),
            other => panic!("expected stream error, got {other:?}"),
        }
    }

    #[test]
    fn test_type_field_used_when_event_name_missing() {
        let ev = SseEvent {
            event: None,
            data: r#"{"type":"message_stop"}"#.to_string(),
        };
        assert_eq!(classify_stream_event(&ev).unwrap(), StreamSignal::Stop);
    }

    #[test]
    fn test_malformed_event_data_is_stream_error() {
        let ev = event("content_block_delta", "{not json");
        assert!(matches!(
            classify_stream_event(&ev),
            Err(LlmError::Stream(_))
        ));
    }

    #[test]
    fn test_tool_input_is_found_by_name() {
        let response: LlmResponse = serde_json::from_value(serde_json::json!({
            "content": [
                {"type": "tool_use", "name": "record_keywords", "input": {"keywords": ["Rust"]}}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }))
        .unwrap();
        let input = response.tool_input("record_keywords").unwrap();
        assert_eq!(input["keywords"][0], "Rust");
        assert!(response.text().is_none());
    }

    #[test]
    fn test_stream_request_serializes_stream_flag_only_when_set() {
        let body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system: "sys",
            messages: vec![],
            tools: None,
            tool_choice: None,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("stream").is_none());
        assert!(json.get("tools").is_none());
    }

    fn sse_chunks(chunks: &[&'static str]) -> Vec<Result<&'static [u8], LlmError>> {
        chunks.iter().map(|c| Ok(c.as_bytes())).collect()
    }

    #[tokio::test]
    async fn test_text_fragments_in_arrival_order() {
        let chunks = sse_chunks(&[
            "event: message_start\ndata: {\"type\":\"message_start\"}\n\n",
            "event: content_block_delta\ndata: {\"delta\":{\"type\":\"text_delta\",\"text\":\"Dear \"}}\n\nevent: content_block_delta\n",
            "data: {\"delta\":{\"type\":\"text_delta\",\"text\":\"team\"}}\n\n",
            "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
        ]);
        let fragments: Vec<_> = text_fragments(futures::stream::iter(chunks)).collect().await;
        let fragments: Vec<String> = fragments.into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(fragments, vec!["Dear ".to_string(), "team".to_string()]);
    }

    #[tokio::test]
    async fn test_text_fragments_truncated_stream_is_error() {
        let chunks = sse_chunks(&[
            "event: content_block_delta\ndata: {\"delta\":{\"type\":\"text_delta\",\"text\":\"Dear\"}}\n\n",
        ]);
        let items: Vec<_> = text_fragments(futures::stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().unwrap(), "Dear");
        assert!(
            matches!(&items[1], Err(LlmError::Stream(m)) if m == "stream ended before message_stop")
        );
    }

    #[tokio::test]
    async fn test_text_fragments_cut_mid_event_is_error() {
        let chunks = sse_chunks(&[
            "event: content_block_delta\ndata: {\"delta\":{\"type\":\"text_delta\",\"text\":\"Dear\"}}\n\n",
            "event: content_block_delta\ndata: {\"delta\":",
        ]);
        let items: Vec<_> = text_fragments(futures::stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert!(
            matches!(&items[1], Err(LlmError::Stream(m)) if m == "stream ended in the middle of an event")
        );
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = LlmClient::new("key".to_string(), "http://localhost:9999/").unwrap();
        assert_eq!(client.messages_url(), "http://localhost:9999/v1/messages");
    }
}
