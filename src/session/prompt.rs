//! Prompts and where they come from

use super::parts::PartId;
use serde::{Deserialize, Serialize};

/// One question shown and read to the candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: u32,
    pub text: String,
    pub part: PartId,
    /// Picture shown alongside the prompt
    #[serde(default, alias = "image")]
    pub media: Option<String>,
    /// Picture task kind: describe, analyze or interpret
    #[serde(default, alias = "type")]
    pub subtype: Option<String>,
    /// Overrides the configured reading or preparation time
    #[serde(default, alias = "readingTime")]
    pub reading_override_secs: Option<f64>,
    /// Overrides the configured answer time
    #[serde(default, alias = "answerTime")]
    pub answer_override_secs: Option<f64>,
}

impl Prompt {
    pub fn new(id: u32, part: PartId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            part,
            media: None,
            subtype: None,
            reading_override_secs: None,
            answer_override_secs: None,
        }
    }

    pub fn with_media(mut self, media: impl Into<String>) -> Self {
        self.media = Some(media.into());
        self
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn with_overrides(mut self, reading: Option<f64>, answer: Option<f64>) -> Self {
        self.reading_override_secs = reading;
        self.answer_override_secs = answer;
        self
    }
}

/// Descriptive data about a part, as published by a prompt source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartMetadata {
    pub title: String,
    pub total_questions: usize,
    #[serde(default)]
    pub first_phase_secs: Option<f64>,
    #[serde(default)]
    pub answer_secs: Option<f64>,
}

/// Supplies prompts for a session
pub trait PromptSource: Send + Sync {
    /// Up to `count` prompts for `part`. Fewer, or none, is allowed.
    fn prompts(&self, part: PartId, count: usize) -> Vec<Prompt>;

    fn part_metadata(&self, part: PartId) -> Option<PartMetadata>;
}
