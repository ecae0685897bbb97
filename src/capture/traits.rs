//! Capture trait definitions
//!
//! Platform-agnostic media sources: what the recorder asks the host for, and
//! the streams and tracks it gets back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Capture errors
///
/// The first six variants are the acquisition failure taxonomy; the rest are
/// recorder misuse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device busy: {0}")]
    DeviceBusy(String),

    #[error("Capture cancelled by user: {0}")]
    UserCancelled(String),

    #[error("Capture not supported: {0}")]
    Unsupported(String),

    #[error("Capture failed: {0}")]
    Unknown(String),

    #[error("No capture source acquired")]
    NotAcquired,

    #[error("Already recording")]
    AlreadyRecording,

    #[error("Recorder unavailable: {0}")]
    RecorderUnavailable(String),
}

impl CaptureError {
    /// Notice shown when screen capture fails and the camera is tried instead
    pub fn fallback_notice(&self) -> &'static str {
        match self {
            CaptureError::PermissionDenied(_) => {
                "Screen recording permission denied. Using camera instead."
            }
            CaptureError::DeviceNotFound(_) => "Screen recording not available. Using camera instead.",
            CaptureError::DeviceBusy(_) => "Screen recording busy. Using camera instead.",
            CaptureError::UserCancelled(_) => "Screen recording cancelled. Using camera instead.",
            CaptureError::Unsupported(_) => "Screen recording not supported. Using camera instead.",
            _ => "Screen recording failed. Using camera instead.",
        }
    }

    /// Message shown when no source at all could be acquired
    pub fn acquisition_message(&self) -> String {
        let detail = match self {
            CaptureError::PermissionDenied(_) => {
                "Please allow screen recording or camera access to continue with the test."
            }
            CaptureError::DeviceNotFound(_) => "No recording device found on this system.",
            CaptureError::DeviceBusy(_) => {
                "Recording device is being used by another application."
            }
            CaptureError::UserCancelled(_) => "Screen recording was cancelled. Please try again.",
            _ => "Please check your recording settings and try again.",
        };
        format!("Recording access failed. {}", detail)
    }
}

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

/// Where the recorded video comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Screen,
    Camera,
}

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Screen => "Screen + Microphone",
            SourceKind::Camera => "Camera Recording",
        }
    }
}

/// Screen capture request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub frame_rate: u32,
    /// Always draw the cursor
    pub cursor: bool,
    /// Ask the host to offer the current tab first
    pub prefer_current_tab: bool,
    /// Screen audio is never requested; the microphone is sourced separately
    pub system_audio: bool,
}

impl Default for DisplayConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 1920,
            ideal_height: 1080,
            frame_rate: 30,
            cursor: true,
            prefer_current_tab: false,
            system_audio: false,
        }
    }
}

/// Camera capture request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing_user: bool,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 640,
            ideal_height: 480,
            facing_user: true,
        }
    }
}

/// Microphone capture request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicrophoneConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub sample_rate: u32,
}

impl Default for MicrophoneConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            sample_rate: 44100,
        }
    }
}

static NEXT_TRACK_ID: AtomicU64 = AtomicU64::new(1);

/// One live media track.
///
/// Clones share the same underlying track: stopping any clone ends all of
/// them, which is also how a host reports that the user revoked a source.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    id: u64,
    kind: TrackKind,
    label: String,
    ended: Arc<watch::Sender<bool>>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        let (ended, _) = watch::channel(false);
        Self {
            id: NEXT_TRACK_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            label: label.into(),
            ended: Arc::new(ended),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// End the track. Idempotent.
    pub fn stop(&self) {
        self.ended.send_if_modified(|ended| !std::mem::replace(ended, true));
    }

    pub fn is_ended(&self) -> bool {
        *self.ended.borrow()
    }

    /// Resolves once the track has ended
    pub async fn ended(&self) {
        let mut rx = self.ended.subscribe();
        let _ = rx.wait_for(|ended| *ended).await;
    }
}

/// A set of tracks recorded together
#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self { tracks }
    }

    /// Video from one stream with audio from another
    pub fn combine(video: &MediaStream, audio: &MediaStream) -> Self {
        let tracks = video
            .video_tracks()
            .chain(audio.audio_tracks())
            .cloned()
            .collect();
        Self { tracks }
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    pub fn has_video(&self) -> bool {
        self.video_tracks().next().is_some()
    }

    /// At least one track still live
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(|t| !t.is_ended())
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
            tracing::debug!("Stopped {:?} track ({})", track.kind(), track.label());
        }
    }
}

/// Encodes a live stream into timed segments
pub trait SegmentEncoder: Send {
    /// Bytes produced since the previous call
    fn next_segment(&mut self) -> Vec<u8>;

    /// Whatever is still buffered when recording stops
    fn flush(&mut self) -> Vec<u8>;
}

/// Host media capabilities
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Screen capture, video only
    async fn display_media(&self, constraints: &DisplayConstraints) -> Result<MediaStream, CaptureError>;

    /// Microphone only
    async fn microphone(&self, constraints: &MicrophoneConstraints) -> Result<MediaStream, CaptureError>;

    /// Camera video with microphone audio
    async fn camera_with_microphone(
        &self,
        camera: &CameraConstraints,
        microphone: &MicrophoneConstraints,
    ) -> Result<MediaStream, CaptureError>;

    fn is_mime_supported(&self, mime_type: &str) -> bool;

    /// Open an encoder over `stream`
    fn encoder(&self, stream: &MediaStream, mime_type: &str) -> Result<Box<dyn SegmentEncoder>, CaptureError>;
}

/// Container formats in order of preference
pub const MIME_PREFERENCES: [&str; 4] = [
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm",
    "video/mp4",
];

/// First supported MIME type, `video/webm` if none is
pub fn negotiate_mime_type(is_supported: impl Fn(&str) -> bool) -> &'static str {
    MIME_PREFERENCES
        .iter()
        .copied()
        .find(|mime| is_supported(mime))
        .unwrap_or("video/webm")
}
