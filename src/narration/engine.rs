//! Speech engine abstraction
//!
//! The engine is whatever actually produces audio. It may be missing, may
//! fail, and may be cancelled mid-utterance; the [`Narrator`](super::Narrator)
//! papers over all of that.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a speech engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NarrationError {
    #[error("Speech synthesis not supported")]
    Unsupported,

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),
}

/// A voice offered by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceInfo {
    pub name: String,
    pub lang: String,
    pub is_default: bool,
}

/// One request to speak
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utterance {
    pub text: String,
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub lang: String,
}

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: None,
            rate: 0.9,
            pitch: 1.0,
            volume: 1.0,
            lang: "en-US".to_string(),
        }
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_voice(mut self, voice: Option<String>) -> Self {
        self.voice = voice;
        self
    }
}

/// Text-to-speech backend
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Whether speech is available at all
    fn is_supported(&self) -> bool;

    /// Voices currently available
    fn voices(&self) -> Vec<VoiceInfo>;

    /// Speak and resolve when the utterance has finished
    async fn speak(&self, utterance: &Utterance) -> Result<(), NarrationError>;

    /// Silence whatever is currently being spoken
    fn cancel(&self);
}

/// Engine for hosts without speech output
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableSpeech;

#[async_trait]
impl SpeechEngine for UnavailableSpeech {
    fn is_supported(&self) -> bool {
        false
    }

    fn voices(&self) -> Vec<VoiceInfo> {
        Vec::new()
    }

    async fn speak(&self, _utterance: &Utterance) -> Result<(), NarrationError> {
        Err(NarrationError::Unsupported)
    }

    fn cancel(&self) {}
}

/// Engine that stands in for real speech by taking as long as speaking would.
///
/// Duration is derived from the word count at `words_per_minute`, scaled by the
/// utterance rate. Every utterance is remembered so callers can inspect what
/// would have been said.
pub struct PacedSpeech {
    words_per_minute: f64,
    voices: Vec<VoiceInfo>,
    spoken: Mutex<Vec<Utterance>>,
}

impl PacedSpeech {
    pub fn new(words_per_minute: f64) -> Self {
        Self {
            words_per_minute: words_per_minute.max(1.0),
            voices: vec![VoiceInfo {
                name: "Paced English".to_string(),
                lang: "en-US".to_string(),
                is_default: true,
            }],
            spoken: Mutex::new(Vec::new()),
        }
    }

    pub fn with_voices(mut self, voices: Vec<VoiceInfo>) -> Self {
        self.voices = voices;
        self
    }

    pub fn utterance_duration(&self, utterance: &Utterance) -> Duration {
        let words = utterance.text.split_whitespace().count() as f64;
        let rate = if utterance.rate > 0.0 { utterance.rate as f64 } else { 1.0 };
        Duration::from_secs_f64(words * 60.0 / (self.words_per_minute * rate))
    }

    /// Everything spoken so far, in order
    pub fn spoken(&self) -> Vec<Utterance> {
        self.spoken.lock().clone()
    }
}

impl Default for PacedSpeech {
    fn default() -> Self {
        Self::new(150.0)
    }
}

#[async_trait]
impl SpeechEngine for PacedSpeech {
    fn is_supported(&self) -> bool {
        true
    }

    fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.clone()
    }

    async fn speak(&self, utterance: &Utterance) -> Result<(), NarrationError> {
        self.spoken.lock().push(utterance.clone());
        tokio::time::sleep(self.utterance_duration(utterance)).await;
        Ok(())
    }

    fn cancel(&self) {}
}

/// Pick a narration voice.
///
/// English voices from Google, Microsoft, or the platform default are
/// preferred, and among those one that sounds female. Otherwise any English
/// voice, otherwise the first voice.
pub fn select_voice(voices: &[VoiceInfo]) -> Option<&VoiceInfo> {
    let english: Vec<&VoiceInfo> = voices
        .iter()
        .filter(|v| {
            v.lang.starts_with("en-")
                && (v.name.contains("Google") || v.name.contains("Microsoft") || v.is_default)
        })
        .collect();

    if !english.is_empty() {
        return english
            .iter()
            .find(|v| {
                let name = v.name.to_lowercase();
                name.contains("female") || name.contains("zira") || name.contains("hazel")
            })
            .or_else(|| english.first())
            .copied();
    }

    voices
        .iter()
        .find(|v| v.lang.starts_with("en-"))
        .or_else(|| voices.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(name: &str, lang: &str, is_default: bool) -> VoiceInfo {
        VoiceInfo {
            name: name.to_string(),
            lang: lang.to_string(),
            is_default,
        }
    }

    #[test]
    fn test_select_voice_prefers_female_english() {
        let voices = vec![
            voice("Google Deutsch", "de-DE", false),
            voice("Microsoft David", "en-US", false),
            voice("Microsoft Zira", "en-US", false),
        ];
        assert_eq!(select_voice(&voices).map(|v| v.name.as_str()), Some("Microsoft Zira"));
    }

    #[test]
    fn test_select_voice_falls_back() {
        let voices = vec![voice("Amelie", "fr-FR", false), voice("Daniel", "en-GB", false)];
        assert_eq!(select_voice(&voices).map(|v| v.name.as_str()), Some("Daniel"));

        let voices = vec![voice("Amelie", "fr-FR", false)];
        assert_eq!(select_voice(&voices).map(|v| v.name.as_str()), Some("Amelie"));

        assert!(select_voice(&[]).is_none());
    }

    #[test]
    fn test_paced_duration_scales_with_rate() {
        let engine = PacedSpeech::new(120.0);
        let normal = Utterance::new("one two three four").with_rate(1.0);
        let slow = normal.clone().with_rate(0.5);
        assert_eq!(engine.utterance_duration(&normal), Duration::from_secs(2));
        assert_eq!(engine.utterance_duration(&slow), Duration::from_secs(4));
    }
}
