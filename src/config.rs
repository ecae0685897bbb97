//! Player configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.
//! Durations are seconds, delays are milliseconds.

use crate::recorder::coordinator::RecorderSettings;
use crate::session::parts::{PartId, Phase};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Longest phase a test may run, in seconds
pub const MAX_PHASE_SECS: f64 = 3600.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("No {phase} duration configured for Part {part}")]
    MissingDuration { part: &'static str, phase: Phase },

    #[error("Invalid {phase} duration for Part {part}: {value}")]
    InvalidDuration {
        part: &'static str,
        phase: Phase,
        value: f64,
    },

    #[error("Invalid {field}: must be greater than zero")]
    ZeroInterval { field: &'static str },
}

/// Per-part timing and question count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartTiming {
    pub question_count: usize,
    /// Reading time for parts 1.x, preparation time for parts 2 and 3
    pub first_phase_secs: Option<f64>,
    pub answer_secs: Option<f64>,
}

impl PartTiming {
    fn new(question_count: usize, first_phase_secs: f64, answer_secs: f64) -> Self {
        Self {
            question_count,
            first_phase_secs: Some(first_phase_secs),
            answer_secs: Some(answer_secs),
        }
    }
}

/// Part 1.2 answer times by picture task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PictureAnswerTimes {
    pub describe: Option<f64>,
    pub analyze: Option<f64>,
    pub interpret: Option<f64>,
}

impl Default for PictureAnswerTimes {
    fn default() -> Self {
        Self {
            describe: Some(40.0),
            analyze: Some(30.0),
            interpret: Some(30.0),
        }
    }
}

impl PictureAnswerTimes {
    /// Unknown or missing subtypes are treated as `describe`
    pub fn for_subtype(&self, subtype: Option<&str>) -> Option<f64> {
        match subtype {
            Some("analyze") => self.analyze,
            Some("interpret") => self.interpret,
            _ => self.describe,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerConfig {
    /// Pause between two questions of the same part
    pub settle_delay_ms: u64,
    /// How long the between-parts interstitial stays up
    pub transition_hold_ms: u64,
    /// Time on the completion view before resources are released
    pub completion_grace_ms: u64,
    /// Time the download status stays visible after a manual stop
    pub manual_stop_delay_ms: u64,
    pub timer_tick_ms: u64,
    /// Upper bound on a single announcement
    pub narration_timeout_ms: u64,
    pub recorder: RecorderSettings,
    pub interview: PartTiming,
    pub picture_description: PartTiming,
    pub long_turn: PartTiming,
    pub discussion: PartTiming,
    pub picture_answers: PictureAnswerTimes,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 1000,
            transition_hold_ms: 3500,
            completion_grace_ms: 5000,
            manual_stop_delay_ms: 3000,
            timer_tick_ms: 100,
            narration_timeout_ms: 60_000,
            recorder: RecorderSettings::default(),
            interview: PartTiming::new(3, 4.0, 30.0),
            picture_description: PartTiming {
                question_count: 3,
                first_phase_secs: Some(5.0),
                answer_secs: None,
            },
            long_turn: PartTiming::new(1, 60.0, 120.0),
            discussion: PartTiming::new(1, 60.0, 120.0),
            picture_answers: PictureAnswerTimes::default(),
        }
    }
}

impl PlayerConfig {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: PlayerConfig =
            serde_json::from_str(json).context("Failed to parse player config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn timing(&self, part: PartId) -> &PartTiming {
        match part {
            PartId::Interview => &self.interview,
            PartId::PictureDescription => &self.picture_description,
            PartId::LongTurn => &self.long_turn,
            PartId::Discussion => &self.discussion,
        }
    }

    /// Configured answer time for a prompt of `part` with the given subtype
    pub fn answer_secs(&self, part: PartId, subtype: Option<&str>) -> Option<f64> {
        match part {
            PartId::PictureDescription => self
                .timing(part)
                .answer_secs
                .or_else(|| self.picture_answers.for_subtype(subtype)),
            _ => self.timing(part).answer_secs,
        }
    }

    /// Reject configurations that could leave a phase without a duration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("timerTickMs", self.timer_tick_ms),
            ("narrationTimeoutMs", self.narration_timeout_ms),
            ("recorder.timesliceMs", self.recorder.timeslice_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroInterval { field });
            }
        }

        for part in PartId::ALL {
            let timing = self.timing(part);
            check_duration(part, part.first_phase(), timing.first_phase_secs)?;

            if part == PartId::PictureDescription && timing.answer_secs.is_none() {
                for subtype in ["describe", "analyze", "interpret"] {
                    check_duration(part, Phase::Answer, self.picture_answers.for_subtype(Some(subtype)))?;
                }
            } else {
                check_duration(part, Phase::Answer, timing.answer_secs)?;
            }
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn transition_hold(&self) -> Duration {
        Duration::from_millis(self.transition_hold_ms)
    }

    pub fn completion_grace(&self) -> Duration {
        Duration::from_millis(self.completion_grace_ms)
    }

    pub fn manual_stop_delay(&self) -> Duration {
        Duration::from_millis(self.manual_stop_delay_ms)
    }

    pub fn timer_tick(&self) -> Duration {
        Duration::from_millis(self.timer_tick_ms)
    }

    pub fn narration_timeout(&self) -> Duration {
        Duration::from_millis(self.narration_timeout_ms)
    }
}

/// A duration must be present, not negative and at most [`MAX_PHASE_SECS`]
pub fn check_duration(part: PartId, phase: Phase, value: Option<f64>) -> Result<f64, ConfigError> {
    match value {
        None => Err(ConfigError::MissingDuration {
            part: part.key(),
            phase,
        }),
        Some(v) if !(0.0..=MAX_PHASE_SECS).contains(&v) => Err(ConfigError::InvalidDuration {
            part: part.key(),
            phase,
            value: v,
        }),
        Some(v) => Ok(v),
    }
}
