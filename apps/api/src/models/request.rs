use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Output language for generated documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    German,
    French,
}

impl Language {
    /// Name used inside prompts.
    pub fn prompt_name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::German => "German",
            Language::French => "French",
        }
    }
}

/// Inputs for one generation. Built fresh per trigger and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub cv_text: String,
    pub job_description: String,
    #[serde(default)]
    pub target_language: Language,
    pub target_word_count: NonZeroU32,
}

impl GenerationRequest {
    /// True when both texts contain something other than whitespace.
    pub fn has_required_input(&self) -> bool {
        !self.cv_text.trim().is_empty() && !self.job_description.trim().is_empty()
    }
}
