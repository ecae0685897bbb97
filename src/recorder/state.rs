//! Recorder state management
//!
//! Recorder lifecycle, status snapshots, and the finalized artifact.

use crate::capture::SourceKind;
use serde::{Deserialize, Serialize};

/// Current state of the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// No recorder has been created (nothing acquired)
    Unavailable,
    /// Acquired, not recording
    Inactive,
    /// Continuously recording segments
    Recording,
}

impl Default for RecorderState {
    fn default() -> Self {
        Self::Unavailable
    }
}

/// Snapshot of the capture side for status surfaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStatus {
    pub has_permission: bool,
    pub is_recording: bool,
    pub recorder_state: RecorderState,
    pub stream_active: bool,
    pub source: Option<SourceKind>,
    /// "Screen + Microphone", "Camera Recording", "Recording Stopped" or "No Recording"
    pub label: String,
    pub mime_type: Option<String>,
    pub segment_count: usize,
    pub buffered_bytes: usize,
}

impl Default for CaptureStatus {
    fn default() -> Self {
        Self {
            has_permission: false,
            is_recording: false,
            recorder_state: RecorderState::Unavailable,
            stream_active: false,
            source: None,
            label: "No Recording".to_string(),
            mime_type: None,
            segment_count: 0,
            buffered_bytes: 0,
        }
    }
}

/// A finalized recording, owned by whoever extracted it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Artifact {
    pub fn from_segments(segments: &[Vec<u8>], mime_type: impl Into<String>) -> Self {
        Self {
            bytes: segments.concat(),
            mime_type: mime_type.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Size rounded to kilobytes, for log lines
    pub fn size_kb(&self) -> usize {
        (self.bytes.len() + 512) / 1024
    }
}
