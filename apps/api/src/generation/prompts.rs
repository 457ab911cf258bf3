// All LLM prompt constants for the Generation module.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::llm_client::prompts::{join_keywords, PLAIN_PROSE_INSTRUCTION};
use crate::models::request::GenerationRequest;
use crate::models::session::KeywordSet;

/// Upper bound requested from the model. A prompt-level convention, not enforced.
pub const MAX_KEYWORDS: usize = 20;

/// System prompt for keyword extraction.
pub const KEYWORD_SYSTEM: &str = "You are an expert recruiter and job description analyst. \
    You identify the skills, technologies and qualities a hiring manager is looking for. \
    Record your answer with the provided tool only.";

/// Keyword extraction prompt template. Replace: {max_keywords}, {job_description}
pub const KEYWORD_PROMPT_TEMPLATE: &str = r#"Extract up to {max_keywords} keywords from the job description below.

Order them by relevance to the role, most relevant first. Prefer concrete skills,
technologies, domains and qualities over generic words.

Return a JSON object with this EXACT schema:
{"keywords": ["keyword one", "keyword two"]}

JOB DESCRIPTION:
{job_description}"#;

/// System prompt for cover letter generation.
pub const COVER_LETTER_SYSTEM: &str = "You are an experienced career coach who writes \
    persuasive, specific and honest cover letters. You never invent experience that is \
    not in the candidate's CV.";

/// Cover letter prompt template.
/// Replace: {language}, {word_count}, {keywords}, {cv_text}, {job_description}, {plain_prose}
pub const COVER_LETTER_PROMPT_TEMPLATE: &str = r#"Write a cover letter in {language} of approximately {word_count} words for the job described below, based on the candidate's CV.

Use these keywords as thematic guidance for what to emphasise: {keywords}
Do NOT repeat the keywords verbatim as a list and do NOT highlight or emphasise them in any way.

{plain_prose}

CV:
{cv_text}

JOB DESCRIPTION:
{job_description}"#;

/// System prompt for the short profile.
pub const PROFILE_SYSTEM: &str = "You are an experienced CV writer who condenses a career \
    into a crisp professional summary.";

/// Short profile prompt template. Replace: {keywords}, {cv_text}, {plain_prose}
///
/// The job description is intentionally absent; the profile is derived from the CV
/// and keywords alone.
pub const PROFILE_PROMPT_TEMPLATE: &str = r#"Write a short professional profile for the candidate whose CV is below.

Requirements:
- A single paragraph of 50 to 70 words.
- Professional tone, written in the third person without the candidate's name.
- No lists.
- Let these keywords guide the focus: {keywords}

{plain_prose}

CV:
{cv_text}"#;

pub fn build_keyword_prompt(job_description: &str) -> String {
    fill_template(
        KEYWORD_PROMPT_TEMPLATE,
        &[
            ("max_keywords", MAX_KEYWORDS.to_string().as_str()),
            ("job_description", job_description),
        ],
    )
}

pub fn build_cover_letter_prompt(request: &GenerationRequest, keywords: &KeywordSet) -> String {
    fill_template(
        COVER_LETTER_PROMPT_TEMPLATE,
        &[
            ("language", request.target_language.prompt_name()),
            ("word_count", request.target_word_count.to_string().as_str()),
            ("keywords", join_keywords(keywords).as_str()),
            ("plain_prose", PLAIN_PROSE_INSTRUCTION),
            ("cv_text", request.cv_text.as_str()),
            ("job_description", request.job_description.as_str()),
        ],
    )
}

pub fn build_profile_prompt(request: &GenerationRequest, keywords: &KeywordSet) -> String {
    fill_template(
        PROFILE_PROMPT_TEMPLATE,
        &[
            ("keywords", join_keywords(keywords).as_str()),
            ("plain_prose", PLAIN_PROSE_INSTRUCTION),
            ("cv_text", request.cv_text.as_str()),
        ],
    )
}

/// Substitutes `{name}` placeholders in a single pass over the template.
/// Inserted values are never scanned again, so braces in CV, job description or
/// keyword text stay literal. Unknown `{...}` sequences are left as they are.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let placeholder = tail.find('}').and_then(|end| {
            let name = &tail[1..end];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (end, *value))
        });
        match placeholder {
            Some((end, value)) => {
                out.push_str(value);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}
