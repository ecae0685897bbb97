//! Recording system module
//!
//! The [`CapturePort`] is everything the session core may do with media:
//! acquire a source, record continuously, pull the artifact, release buffers.
//! The underlying stream and recorder are owned by the implementation; the
//! core never touches them directly.

pub mod coordinator;
pub mod state;

pub use coordinator::{RecordingCoordinator, RecordingEvent};
pub use state::{Artifact, CaptureStatus, RecorderState};

use crate::capture::{CaptureError, SourceKind};
use async_trait::async_trait;
use tokio::sync::broadcast;

#[async_trait]
pub trait CapturePort: Send + Sync {
    /// Acquire screen + microphone, falling back to camera + microphone.
    /// Fails only when both are unavailable.
    async fn acquire(&self) -> Result<SourceKind, CaptureError>;

    /// Begin recording segments. Fails if nothing was acquired or already recording.
    fn start_continuous_capture(&self) -> Result<(), CaptureError>;

    /// Halt the recorder and gather every buffered segment into one artifact.
    /// `None` when nothing was recorded. Buffered segments are kept.
    async fn extract_artifact(&self) -> Result<Option<Artifact>, CaptureError>;

    /// Everything recorded so far, without halting the recorder. `None` when
    /// nothing has been recorded yet.
    fn snapshot_artifact(&self) -> Option<Artifact>;

    /// Drop buffered segments
    fn release_buffered_segments(&self);

    /// Stop recording, stop every track, forget the stream. Synchronous so it
    /// can run from an emergency path.
    fn cleanup(&self);

    fn status(&self) -> CaptureStatus;

    /// Acquisition notices and mid-session source loss
    fn subscribe(&self) -> broadcast::Receiver<RecordingEvent>;
}
