//! Spoken announcements
//!
//! The session core formats what to say; a [`NarrationPort`] says it. Ports
//! must never block test progress: every announcement resolves, whether it
//! was spoken, skipped, or cut off by a newer one.

pub mod engine;
pub mod narrator;

pub use engine::{
    select_voice, NarrationError, PacedSpeech, SpeechEngine, UnavailableSpeech, Utterance,
    VoiceInfo,
};
pub use narrator::Narrator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What an announcement is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementKind {
    /// Reading out a prompt
    Question,
    /// Between two parts
    Transition,
    /// End of the test
    Completion,
}

impl AnnouncementKind {
    /// Speaking rate; transitions are read more slowly than prompts
    pub fn rate(&self) -> f32 {
        match self {
            AnnouncementKind::Question => 0.9,
            AnnouncementKind::Transition | AnnouncementKind::Completion => 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub kind: AnnouncementKind,
    pub text: String,
}

impl Announcement {
    pub fn new(kind: AnnouncementKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Narration capability consumed by the session core
#[async_trait]
pub trait NarrationPort: Send + Sync {
    /// Speak and resolve when done. Never fails; a newer announcement or
    /// [`cancel`](Self::cancel) resolves this one early.
    async fn announce(&self, announcement: &Announcement);

    /// Silence any in-flight announcement
    fn cancel(&self);

    fn is_speaking(&self) -> bool;
}
