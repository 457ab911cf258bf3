//! Keyword extraction — the advisory first step of a generation.
//!
//! A transport or API failure is an error. Output that cannot be read as
//! `{"keywords": [...]}` is not: it degrades to an empty keyword set.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::generation::prompts::{build_keyword_prompt, KEYWORD_SYSTEM};
use crate::llm_client::{strip_json_fences, LlmError, LlmGateway, StructuredSchema};
use crate::models::session::KeywordSet;

const KEYWORD_TOOL: &str = "record_keywords";

#[derive(Debug, Deserialize)]
struct KeywordResponse {
    keywords: Vec<String>,
}

/// Schema the model's keyword answer is constrained to.
pub fn keyword_schema() -> StructuredSchema {
    StructuredSchema {
        name: KEYWORD_TOOL,
        description: "Record the keywords extracted from the job description, most relevant first.",
        schema: json!({
            "type": "object",
            "properties": {
                "keywords": {
                    "type": "array",
                    "items": { "type": "string" }
                }
            },
            "required": ["keywords"]
        }),
    }
}

/// Runs the structured extraction call and interprets its answer.
pub async fn extract_keywords(
    llm: &dyn LlmGateway,
    job_description: &str,
) -> Result<KeywordSet, LlmError> {
    let prompt = build_keyword_prompt(job_description);
    let raw = llm
        .generate_structured(&prompt, KEYWORD_SYSTEM, &keyword_schema())
        .await?;
    Ok(parse_keywords(&raw))
}

/// Reads `{"keywords": [...]}`; anything else yields an empty set.
/// Blank entries are dropped, the model's order is kept.
pub fn parse_keywords(raw: &str) -> KeywordSet {
    match serde_json::from_str::<KeywordResponse>(strip_json_fences(raw)) {
        Ok(response) => {
            let keywords: KeywordSet = response
                .keywords
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
            if keywords.is_empty() {
                debug!("Keyword extraction returned an empty list");
            }
            keywords
        }
        Err(e) => {
            warn!(
                error = %e,
                "Keyword extraction output malformed, continuing without keywords: {:?}",
                raw.chars().take(80).collect::<String>()
            );
            Vec::new()
        }
    }
}
