// Generation engine: keyword extraction, then the cover letter and short
// profile streamed concurrently.
// All LLM calls go through llm_client via the LlmGateway trait.

pub mod handlers;
pub mod keywords;
pub mod orchestrator;
pub mod prompts;
