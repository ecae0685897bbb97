//! Recording coordinator
//!
//! Acquires a source through [`MediaDevices`], records it in fixed time
//! slices on a background task, and hands back the buffered segments as one
//! artifact.

use super::state::{Artifact, CaptureStatus, RecorderState};
use super::CapturePort;
use crate::capture::{
    negotiate_mime_type, CameraConstraints, CaptureError, DisplayConstraints, MediaDevices,
    MediaStream, MicrophoneConstraints, SourceKind,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

/// Events emitted by the recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingEvent {
    /// A source was acquired
    Acquired(SourceKind),
    /// Screen capture failed; the camera is being tried
    FallingBack { notice: String },
    /// Neither screen nor camera could be acquired
    AcquisitionFailed { message: String },
    /// Recording started
    Started,
    /// The video source was ended from outside, recording stopped
    SourceEnded,
    /// Recording stopped; total segments buffered
    Stopped { segments: usize },
}

/// Recorder tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderSettings {
    /// Length of one recorded segment
    pub timeslice_ms: u64,
    /// Screen-share attempts before falling back to the camera
    pub screen_attempts: u32,
    /// Pause between screen-share attempts
    pub screen_retry_delay_ms: u64,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            timeslice_ms: 1000,
            screen_attempts: 2,
            screen_retry_delay_ms: 500,
        }
    }
}

#[derive(Default)]
struct RecorderInner {
    stream: Option<MediaStream>,
    source: Option<SourceKind>,
    has_permission: bool,
    mime_type: Option<String>,
    segments: Vec<Vec<u8>>,
    state: RecorderState,
    source_ended: bool,
}

struct RecordingTask {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// The [`CapturePort`] over a host's media devices
pub struct RecordingCoordinator<D: MediaDevices> {
    devices: Arc<D>,
    settings: RecorderSettings,
    inner: Arc<Mutex<RecorderInner>>,
    task: Mutex<Option<RecordingTask>>,
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl<D: MediaDevices + 'static> RecordingCoordinator<D> {
    pub fn new(devices: Arc<D>, settings: RecorderSettings) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            devices,
            settings,
            inner: Arc::new(Mutex::new(RecorderInner::default())),
            task: Mutex::new(None),
            event_tx,
        }
    }

    async fn acquire_screen(&self) -> Result<MediaStream, CaptureError> {
        let attempts = self.settings.screen_attempts.max(1);
        let mut constraints = DisplayConstraints::default();
        let mut last_error = CaptureError::Unknown("screen capture not attempted".to_string());

        for attempt in 0..attempts {
            if attempt > 0 {
                time::sleep(Duration::from_millis(self.settings.screen_retry_delay_ms)).await;
                constraints.prefer_current_tab = true;
            }
            tracing::info!("Screen recording attempt {}/{}", attempt + 1, attempts);

            match self.devices.display_media(&constraints).await {
                Ok(stream) if stream.has_video() => {
                    tracing::info!("Screen recording stream obtained");
                    return Ok(stream);
                }
                Ok(stream) => {
                    stream.stop_all();
                    last_error = CaptureError::Unknown("No video tracks in stream".to_string());
                }
                Err(e) => {
                    tracing::warn!("Screen recording attempt {} failed: {}", attempt + 1, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn acquire_screen_with_microphone(&self) -> Result<MediaStream, CaptureError> {
        let screen = self.acquire_screen().await?;

        match self.devices.microphone(&MicrophoneConstraints::default()).await {
            Ok(microphone) => {
                tracing::info!("Combined screen video with microphone audio");
                Ok(MediaStream::combine(&screen, &microphone))
            }
            Err(e) => {
                // Screen without audio is still worth recording
                tracing::warn!("Microphone access failed: {}", e);
                Ok(screen)
            }
        }
    }

    fn install(&self, stream: MediaStream, source: SourceKind) {
        let mime_type = negotiate_mime_type(|mime| self.devices.is_mime_supported(mime));
        let mut inner = self.inner.lock();
        *inner = RecorderInner {
            stream: Some(stream),
            source: Some(source),
            has_permission: true,
            mime_type: Some(mime_type.to_string()),
            segments: Vec::new(),
            state: RecorderState::Inactive,
            source_ended: false,
        };
        tracing::info!("Recorder ready: {} ({})", source.label(), mime_type);
    }

    fn abort_task(&self) {
        if let Some(task) = self.task.lock().take() {
            task.handle.abort();
        }
    }
}

#[async_trait]
impl<D: MediaDevices + 'static> CapturePort for RecordingCoordinator<D> {
    async fn acquire(&self) -> Result<SourceKind, CaptureError> {
        // Release any previous stream first
        self.cleanup();

        let (stream, source) = match self.acquire_screen_with_microphone().await {
            Ok(stream) => (stream, SourceKind::Screen),
            Err(screen_error) => {
                let notice = screen_error.fallback_notice().to_string();
                tracing::info!("Screen recording failed ({}), falling back to camera", screen_error);
                let _ = self.event_tx.send(RecordingEvent::FallingBack { notice });

                match self
                    .devices
                    .camera_with_microphone(&CameraConstraints::default(), &MicrophoneConstraints::default())
                    .await
                {
                    Ok(stream) => (stream, SourceKind::Camera),
                    Err(camera_error) => {
                        let message = camera_error.acquisition_message();
                        tracing::error!("Camera fallback failed: {}", camera_error);
                        let _ = self.event_tx.send(RecordingEvent::AcquisitionFailed { message });
                        return Err(camera_error);
                    }
                }
            }
        };

        self.install(stream, source);
        let _ = self.event_tx.send(RecordingEvent::Acquired(source));
        Ok(source)
    }

    fn start_continuous_capture(&self) -> Result<(), CaptureError> {
        let (stream, mime_type) = {
            let inner = self.inner.lock();
            let stream = match (&inner.stream, inner.has_permission) {
                (Some(stream), true) => stream.clone(),
                _ => {
                    tracing::warn!("Cannot start recording: no source acquired");
                    return Err(CaptureError::NotAcquired);
                }
            };
            if inner.state == RecorderState::Recording {
                tracing::warn!("Already recording");
                return Err(CaptureError::AlreadyRecording);
            }
            let mime_type = inner.mime_type.clone().unwrap_or_else(|| "video/webm".to_string());
            (stream, mime_type)
        };

        let video = stream
            .video_tracks()
            .next()
            .cloned()
            .ok_or_else(|| CaptureError::RecorderUnavailable("stream has no video track".to_string()))?;
        let mut encoder = self.devices.encoder(&stream, &mime_type)?;

        // A run left over from an earlier extraction has already finished
        self.abort_task();
        {
            let mut inner = self.inner.lock();
            inner.segments.clear();
            inner.state = RecorderState::Recording;
        }

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let inner = self.inner.clone();
        let event_tx = self.event_tx.clone();
        let timeslice = Duration::from_millis(self.settings.timeslice_ms.max(1));

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + timeslice, timeslice);
            let ended = video.ended();
            tokio::pin!(ended);

            let source_ended = loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let segment = encoder.next_segment();
                        if !segment.is_empty() {
                            inner.lock().segments.push(segment);
                        }
                    }
                    _ = &mut stop_rx => break false,
                    _ = &mut ended => break true,
                }
            };

            let last = encoder.flush();
            let segments = {
                let mut guard = inner.lock();
                if !last.is_empty() {
                    guard.segments.push(last);
                }
                guard.state = RecorderState::Inactive;
                if source_ended {
                    guard.has_permission = false;
                    guard.source_ended = true;
                }
                guard.segments.len()
            };

            if source_ended {
                tracing::warn!("Capture source ended by user, recording stopped");
                let _ = event_tx.send(RecordingEvent::SourceEnded);
            }
            tracing::info!("Recording stopped with {} segments", segments);
            let _ = event_tx.send(RecordingEvent::Stopped { segments });
        });

        *self.task.lock() = Some(RecordingTask { stop_tx, handle });
        let _ = self.event_tx.send(RecordingEvent::Started);
        tracing::info!("Recording started ({}ms segments)", timeslice.as_millis());
        Ok(())
    }

    async fn extract_artifact(&self) -> Result<Option<Artifact>, CaptureError> {
        tracing::info!("Stopping recorder and gathering segments");

        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.stop_tx.send(());
            if let Err(e) = task.handle.await {
                if !e.is_cancelled() {
                    return Err(CaptureError::RecorderUnavailable(format!(
                        "recording task failed: {}",
                        e
                    )));
                }
            }
        }

        let inner = self.inner.lock();
        if inner.segments.is_empty() {
            tracing::warn!("No recorded data available");
            return Ok(None);
        }

        let mime_type = inner.mime_type.clone().unwrap_or_else(|| "video/webm".to_string());
        let artifact = Artifact::from_segments(&inner.segments, mime_type);
        tracing::info!("Recording processed: {}KB", artifact.size_kb());
        Ok(Some(artifact))
    }

    fn snapshot_artifact(&self) -> Option<Artifact> {
        let inner = self.inner.lock();
        if inner.segments.is_empty() {
            return None;
        }
        let mime_type = inner.mime_type.clone().unwrap_or_else(|| "video/webm".to_string());
        let artifact = Artifact::from_segments(&inner.segments, mime_type);
        tracing::debug!("Recording checkpoint: {} segments, {}KB", inner.segments.len(), artifact.size_kb());
        Some(artifact)
    }

    fn release_buffered_segments(&self) {
        self.inner.lock().segments.clear();
        tracing::debug!("Recorded segments cleared");
    }

    fn cleanup(&self) {
        self.abort_task();
        let mut inner = self.inner.lock();
        if let Some(stream) = inner.stream.take() {
            stream.stop_all();
        }
        *inner = RecorderInner::default();
        tracing::debug!("Recorder cleaned up");
    }

    fn status(&self) -> CaptureStatus {
        let inner = self.inner.lock();
        let label = match (inner.source, inner.source_ended) {
            (_, true) => "Recording Stopped".to_string(),
            (Some(source), false) => source.label().to_string(),
            (None, false) => "No Recording".to_string(),
        };
        CaptureStatus {
            has_permission: inner.has_permission,
            is_recording: inner.state == RecorderState::Recording,
            recorder_state: inner.state,
            stream_active: inner.stream.as_ref().map(|s| s.is_active()).unwrap_or(false),
            source: inner.source,
            label,
            mime_type: inner.mime_type.clone(),
            segment_count: inner.segments.len(),
            buffered_bytes: inner.segments.iter().map(|s| s.len()).sum(),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SyntheticDevices;

    fn coordinator(devices: Arc<SyntheticDevices>) -> RecordingCoordinator<SyntheticDevices> {
        RecordingCoordinator::new(devices, RecorderSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_prefers_screen_with_microphone() {
        let devices = Arc::new(SyntheticDevices::new(16));
        let recorder = coordinator(devices.clone());

        assert_eq!(recorder.acquire().await, Ok(SourceKind::Screen));
        let status = recorder.status();
        assert!(status.has_permission);
        assert_eq!(status.label, "Screen + Microphone");
        assert_eq!(status.mime_type.as_deref(), Some("video/webm;codecs=vp8,opus"));
        assert_eq!(devices.calls().camera, 0);
        assert_eq!(devices.calls().microphone, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_screen_failure_retries_then_falls_back_to_camera() {
        let devices = Arc::new(SyntheticDevices::new(16));
        devices.fail_display(CaptureError::PermissionDenied("denied".into()));
        let recorder = coordinator(devices.clone());
        let mut events = recorder.subscribe();

        assert_eq!(recorder.acquire().await, Ok(SourceKind::Camera));
        assert_eq!(devices.calls().display, 2);
        assert_eq!(devices.calls().camera, 1);
        assert!(devices.last_display_constraints().unwrap().prefer_current_tab);
        assert_eq!(
            events.recv().await.unwrap(),
            RecordingEvent::FallingBack {
                notice: "Screen recording permission denied. Using camera instead.".to_string()
            }
        );
        assert_eq!(recorder.status().label, "Camera Recording");
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_fails_only_when_both_sources_fail() {
        let devices = Arc::new(SyntheticDevices::new(16));
        devices.fail_display(CaptureError::Unsupported("no display".into()));
        devices.fail_camera(CaptureError::DeviceNotFound("no camera".into()));
        let recorder = coordinator(devices);

        assert_eq!(
            recorder.acquire().await,
            Err(CaptureError::DeviceNotFound("no camera".into()))
        );
        assert!(!recorder.status().has_permission);
        assert_eq!(recorder.start_continuous_capture(), Err(CaptureError::NotAcquired));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_microphone_keeps_screen_video() {
        let devices = Arc::new(SyntheticDevices::new(16));
        devices.fail_microphone(CaptureError::DeviceBusy("mic busy".into()));
        let recorder = coordinator(devices.clone());

        assert_eq!(recorder.acquire().await, Ok(SourceKind::Screen));
        assert_eq!(devices.calls().camera, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_segments_and_extracts_artifact() {
        let devices = Arc::new(SyntheticDevices::new(10));
        let recorder = coordinator(devices);
        recorder.acquire().await.unwrap();
        recorder.start_continuous_capture().unwrap();
        assert_eq!(recorder.start_continuous_capture(), Err(CaptureError::AlreadyRecording));

        time::sleep(Duration::from_millis(3500)).await;
        assert!(recorder.status().is_recording);
        assert_eq!(recorder.status().segment_count, 3);

        let artifact = recorder.extract_artifact().await.unwrap().unwrap();
        // three timed segments plus the final flush
        assert_eq!(artifact.size(), 40);
        assert!(!recorder.status().is_recording);

        // extraction does not clear, release does
        assert_eq!(recorder.status().buffered_bytes, 40);
        recorder.release_buffered_segments();
        assert_eq!(recorder.status().buffered_bytes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_keeps_recording() {
        let devices = Arc::new(SyntheticDevices::new(10));
        let recorder = coordinator(devices);
        recorder.acquire().await.unwrap();
        assert_eq!(recorder.snapshot_artifact(), None);
        recorder.start_continuous_capture().unwrap();

        time::sleep(Duration::from_millis(2500)).await;
        let early = recorder.snapshot_artifact().unwrap();
        assert_eq!(early.size(), 20);
        assert!(recorder.status().is_recording);

        time::sleep(Duration::from_millis(2000)).await;
        let later = recorder.snapshot_artifact().unwrap();
        assert_eq!(later.size(), 40);
        assert!(later.bytes.starts_with(&early.bytes));

        // the final artifact still holds everything, plus the flush
        let artifact = recorder.extract_artifact().await.unwrap().unwrap();
        assert_eq!(artifact.size(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extract_then_release_allows_clean_restart() {
        let devices = Arc::new(SyntheticDevices::new(10));
        let recorder = coordinator(devices.clone());

        recorder.acquire().await.unwrap();
        recorder.start_continuous_capture().unwrap();
        time::sleep(Duration::from_millis(1500)).await;
        recorder.extract_artifact().await.unwrap().unwrap();
        recorder.release_buffered_segments();

        assert_eq!(recorder.acquire().await, Ok(SourceKind::Screen));
        recorder.start_continuous_capture().unwrap();
        time::sleep(Duration::from_millis(1500)).await;
        let artifact = recorder.extract_artifact().await.unwrap().unwrap();
        assert_eq!(artifact.size(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_ended_marks_recording_stopped() {
        let devices = Arc::new(SyntheticDevices::new(10));
        let recorder = coordinator(devices.clone());
        recorder.acquire().await.unwrap();
        recorder.start_continuous_capture().unwrap();
        time::sleep(Duration::from_millis(2500)).await;

        devices.end_display();
        time::sleep(Duration::from_millis(10)).await;

        let status = recorder.status();
        assert!(!status.is_recording);
        assert!(!status.has_permission);
        assert_eq!(status.label, "Recording Stopped");

        // what was recorded before the share ended is still there
        let artifact = recorder.extract_artifact().await.unwrap().unwrap();
        assert_eq!(artifact.size(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extract_without_recording_is_none() {
        let devices = Arc::new(SyntheticDevices::new(10));
        let recorder = coordinator(devices);
        recorder.acquire().await.unwrap();
        assert_eq!(recorder.extract_artifact().await, Ok(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_stops_tracks() {
        let devices = Arc::new(SyntheticDevices::new(10));
        let recorder = coordinator(devices);
        recorder.acquire().await.unwrap();
        recorder.start_continuous_capture().unwrap();
        assert!(recorder.status().stream_active);

        recorder.cleanup();
        assert_eq!(recorder.status(), CaptureStatus::default());
    }
}
