//! Error types for the capture interface.

use thiserror::Error;
use vidcap_capture::CaptureError;
use vidcap_ipc::{CaptureState, CaptureTarget, ErrorKind};

/// Errors reported by the video capture interface.
#[derive(Debug, Clone, Error)]
pub enum VideoCaptureError {
    /// Malformed input, rejected before any resource was touched.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The platform could not open the requested device or screen.
    #[error("Capture backend unavailable for {target}: {source}")]
    BackendUnavailable {
        target: CaptureTarget,
        #[source]
        source: CaptureError,
    },

    /// The operation is not valid in the current state.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: CaptureState,
    },

    /// The backend stopped producing frames mid-session.
    #[error("Capture backend failed: {0}")]
    InternalBackendFailure(#[source] CaptureError),

    /// The execution context no longer accepts work.
    #[error("Execution context '{0}' is closed")]
    ContextClosed(String),
}

impl VideoCaptureError {
    /// Serializable category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::InternalBackendFailure(_) => ErrorKind::InternalBackendFailure,
            Self::ContextClosed(_) => ErrorKind::ContextClosed,
        }
    }
}

/// Result type for capture interface operations.
pub type VideoCaptureResult<T> = Result<T, VideoCaptureError>;
