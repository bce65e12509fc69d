//! Events reported by the capture context.

use serde::{Deserialize, Serialize};

use crate::state::CaptureState;
use crate::types::{CaptureTarget, ErrorKind, VideoRotation};

/// Outcomes of control operations and backend activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CaptureEvent {
    /// Capture state has changed.
    StateChanged {
        /// Previous state.
        previous: CaptureState,

        /// Current state.
        current: CaptureState,
    },

    /// A control operation or the backend failed.
    Error {
        /// Failure category.
        kind: ErrorKind,

        /// Human readable description.
        message: String,
    },

    /// The capture target was replaced.
    TargetSwitched { target: CaptureTarget },

    /// Output rotation hint was updated.
    RotationChanged(VideoRotation),

    /// The first frame of a backend reached the sink.
    FirstFrame { target: CaptureTarget },
}

impl CaptureEvent {
    /// Returns the error kind if this is an error event.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Error { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
