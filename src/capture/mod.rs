//! Media capture sources
//!
//! This module describes what the recorder can ask a host for (screen,
//! camera, microphone) and ships a synthetic host for headless runs.

pub mod synthetic;
pub mod traits;

pub use synthetic::{DeviceCalls, SyntheticDevices};
pub use traits::{
    negotiate_mime_type, CameraConstraints, CaptureError, DisplayConstraints, MediaDevices,
    MediaStream, MediaTrack, MicrophoneConstraints, SegmentEncoder, SourceKind, TrackKind,
    MIME_PREFERENCES,
};
