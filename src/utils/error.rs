//! Error types and handling
//!
//! Common error types used across the player.

use crate::capture::CaptureError;
use crate::config::ConfigError;
use crate::narration::NarrationError;
use crate::session::SessionError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Player-wide error type
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Recording error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Narration error: {0}")]
    Narration(#[from] NarrationError),
}

/// Error response for whatever renders the test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<PlayerError> for ErrorResponse {
    fn from(error: PlayerError) -> Self {
        let code = match &error {
            PlayerError::Io(_) => "IO_ERROR",
            PlayerError::Serialization(_) => "SERIALIZATION_ERROR",
            PlayerError::Config(_) => "CONFIG_ERROR",
            PlayerError::Session(SessionError::AlreadyActive) => "TEST_ALREADY_ACTIVE",
            PlayerError::Session(SessionError::NotActive) => "TEST_NOT_ACTIVE",
            PlayerError::Session(SessionError::CleanupPending) => "TEST_CLOSING",
            PlayerError::Session(SessionError::Config(_)) => "CONFIG_ERROR",
            PlayerError::Session(SessionError::Acquisition(CaptureError::PermissionDenied(_))) => {
                "PERMISSION_DENIED"
            }
            PlayerError::Session(SessionError::Acquisition(_)) => "RECORDING_UNAVAILABLE",
            PlayerError::Session(SessionError::Capture(_)) => "RECORDING_ERROR",
            PlayerError::Session(SessionError::Cancelled) => "TEST_CANCELLED",
            PlayerError::Capture(CaptureError::PermissionDenied(_)) => "PERMISSION_DENIED",
            PlayerError::Capture(_) => "RECORDING_ERROR",
            PlayerError::Narration(_) => "NARRATION_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

impl From<SessionError> for ErrorResponse {
    fn from(error: SessionError) -> Self {
        PlayerError::from(error).into()
    }
}

/// Result type alias using PlayerError
pub type PlayerResult<T> = Result<T, PlayerError>;
