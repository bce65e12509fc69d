//! Error types for the capture backends.

use thiserror::Error;

/// Errors that can occur inside a capturer backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// Platform API error.
    #[error("Platform capture error: {message}")]
    Platform { message: String },

    /// Capture source not found.
    #[error("Capture source not found: {0}")]
    SourceNotFound(String),

    /// Capture already started.
    #[error("Capture already started")]
    AlreadyStarted,

    /// Capture not started.
    #[error("Capture not started")]
    NotStarted,

    /// Device lost during capture.
    #[error("Capture device lost")]
    DeviceLost,

    /// Capture of this kind is not supported on this system.
    #[error("Capture not supported: {0}")]
    NotSupported(String),

    /// Permission denied for capture.
    #[error("Permission denied for capture")]
    PermissionDenied,

    /// The backend worker thread could not be spawned.
    #[error("Failed to spawn capture thread: {0}")]
    ThreadSpawn(String),
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        Self::ThreadSpawn(err.to_string())
    }
}
