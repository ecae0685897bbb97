//! Synthetic media devices
//!
//! A host backend with no hardware behind it: each source can be told to
//! succeed or fail, and the encoder emits fixed-size segments while the video
//! track is live. Useful for headless runs and for driving the recorder
//! deterministically.

use super::traits::{
    CameraConstraints, CaptureError, DisplayConstraints, MediaDevices, MediaStream, MediaTrack,
    MicrophoneConstraints, SegmentEncoder, TrackKind,
};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Call counts, for assertions about which sources were tried
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceCalls {
    pub display: usize,
    pub microphone: usize,
    pub camera: usize,
}

struct DeviceState {
    display: Result<(), CaptureError>,
    microphone: Result<(), CaptureError>,
    camera: Result<(), CaptureError>,
    calls: DeviceCalls,
    /// Last display constraints seen
    last_display: Option<DisplayConstraints>,
    /// Video track of the most recent screen share
    display_track: Option<MediaTrack>,
}

pub struct SyntheticDevices {
    state: Mutex<DeviceState>,
    segment_bytes: usize,
    supported_mime: Vec<String>,
}

impl SyntheticDevices {
    /// All sources available, `segment_bytes` per recorded segment
    pub fn new(segment_bytes: usize) -> Self {
        Self {
            state: Mutex::new(DeviceState {
                display: Ok(()),
                microphone: Ok(()),
                camera: Ok(()),
                calls: DeviceCalls::default(),
                last_display: None,
                display_track: None,
            }),
            segment_bytes,
            supported_mime: vec!["video/webm;codecs=vp8,opus".to_string(), "video/webm".to_string()],
        }
    }

    pub fn fail_display(&self, error: CaptureError) {
        self.state.lock().display = Err(error);
    }

    pub fn fail_microphone(&self, error: CaptureError) {
        self.state.lock().microphone = Err(error);
    }

    pub fn fail_camera(&self, error: CaptureError) {
        self.state.lock().camera = Err(error);
    }

    pub fn calls(&self) -> DeviceCalls {
        self.state.lock().calls
    }

    pub fn last_display_constraints(&self) -> Option<DisplayConstraints> {
        self.state.lock().last_display.clone()
    }

    /// Simulate the user stopping the screen share
    pub fn end_display(&self) {
        if let Some(track) = self.state.lock().display_track.as_ref() {
            track.stop();
        }
    }
}

#[async_trait]
impl MediaDevices for SyntheticDevices {
    async fn display_media(&self, constraints: &DisplayConstraints) -> Result<MediaStream, CaptureError> {
        let mut state = self.state.lock();
        state.calls.display += 1;
        state.last_display = Some(constraints.clone());
        state.display.clone()?;

        let track = MediaTrack::new(TrackKind::Video, "synthetic screen");
        state.display_track = Some(track.clone());
        Ok(MediaStream::new(vec![track]))
    }

    async fn microphone(&self, _constraints: &MicrophoneConstraints) -> Result<MediaStream, CaptureError> {
        let mut state = self.state.lock();
        state.calls.microphone += 1;
        state.microphone.clone()?;
        Ok(MediaStream::new(vec![MediaTrack::new(TrackKind::Audio, "synthetic microphone")]))
    }

    async fn camera_with_microphone(
        &self,
        _camera: &CameraConstraints,
        _microphone: &MicrophoneConstraints,
    ) -> Result<MediaStream, CaptureError> {
        let mut state = self.state.lock();
        state.calls.camera += 1;
        state.camera.clone()?;
        state.microphone.clone()?;
        Ok(MediaStream::new(vec![
            MediaTrack::new(TrackKind::Video, "synthetic camera"),
            MediaTrack::new(TrackKind::Audio, "synthetic microphone"),
        ]))
    }

    fn is_mime_supported(&self, mime_type: &str) -> bool {
        self.supported_mime.iter().any(|m| m == mime_type)
    }

    fn encoder(&self, stream: &MediaStream, _mime_type: &str) -> Result<Box<dyn SegmentEncoder>, CaptureError> {
        let video = stream
            .video_tracks()
            .next()
            .cloned()
            .ok_or_else(|| CaptureError::RecorderUnavailable("stream has no video track".to_string()))?;
        Ok(Box::new(SyntheticEncoder {
            video,
            segment_bytes: self.segment_bytes,
            produced: 0,
        }))
    }
}

struct SyntheticEncoder {
    video: MediaTrack,
    segment_bytes: usize,
    produced: u64,
}

impl SyntheticEncoder {
    fn segment(&mut self) -> Vec<u8> {
        let marker = (self.produced % 251) as u8;
        self.produced += 1;
        vec![marker; self.segment_bytes]
    }
}

impl SegmentEncoder for SyntheticEncoder {
    fn next_segment(&mut self) -> Vec<u8> {
        if self.video.is_ended() {
            return Vec::new();
        }
        self.segment()
    }

    fn flush(&mut self) -> Vec<u8> {
        self.segment()
    }
}
