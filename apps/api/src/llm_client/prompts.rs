// Shared prompt constants and prompt-building utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// Instruction appended to every free-text generation prompt.
pub const PLAIN_PROSE_INSTRUCTION: &str = "\
    Output plain prose only. Do NOT use markdown, headings, bullet points or bold text. \
    Do NOT add any preamble such as 'Here is...' and do NOT add any closing remark \
    after the requested text.";

/// Rendered in place of the keyword list when extraction produced nothing.
pub const NO_KEYWORDS: &str = "no keywords";

/// Joins keywords for embedding in a prompt, falling back to `NO_KEYWORDS`.
pub fn join_keywords(keywords: &[String]) -> String {
    if keywords.is_empty() {
        NO_KEYWORDS.to_string()
    } else {
        keywords.join(", ")
    }
}
