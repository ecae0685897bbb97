//! Events for whatever renders the test

use super::parts::{PartId, Phase};
use serde::Serialize;

/// Top-level view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Screen {
    Start,
    Speaking,
    Completion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UiEvent {
    #[serde(rename_all = "camelCase")]
    ScreenChanged { screen: Screen },
    #[serde(rename_all = "camelCase")]
    PartStarted {
        part: PartId,
        title: String,
        total_questions: usize,
    },
    #[serde(rename_all = "camelCase")]
    QuestionShown {
        part: PartId,
        number: usize,
        total: usize,
        text: String,
    },
    /// `None` hides the picture
    #[serde(rename_all = "camelCase")]
    MediaShown { media: Option<String> },
    #[serde(rename_all = "camelCase")]
    PhaseChanged { phase: Phase },
    #[serde(rename_all = "camelCase")]
    TimerTick {
        phase: Phase,
        remaining_secs: f64,
        elapsed_secs: f64,
        /// 0.0 at start, 1.0 when the phase ends
        progress: f64,
        /// Remaining time as MM:SS
        clock: String,
    },
    #[serde(rename_all = "camelCase")]
    TransitionShown {
        from: PartId,
        to: PartId,
        title: String,
        message: String,
    },
    TransitionHidden,
    #[serde(rename_all = "camelCase")]
    DownloadProgress { percent: u8, message: String },
    #[serde(rename_all = "camelCase")]
    Notice { level: NoticeLevel, message: String },
}

impl UiEvent {
    pub fn notice(level: NoticeLevel, message: impl Into<String>) -> Self {
        UiEvent::Notice {
            level,
            message: message.into(),
        }
    }

    pub fn progress(percent: u8, message: impl Into<String>) -> Self {
        UiEvent::DownloadProgress {
            percent,
            message: message.into(),
        }
    }
}
