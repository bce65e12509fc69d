//! Common types shared by the capture crates.

use serde::{Deserialize, Serialize};

/// The logical source to capture from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureTarget {
    /// A camera identified by an opaque platform device id.
    CameraDevice(String),

    /// The screen; the region is resolved by the platform backend.
    ScreenRegion,
}

impl CaptureTarget {
    /// Create a camera target.
    pub fn camera(device_id: impl Into<String>) -> Self {
        Self::CameraDevice(device_id.into())
    }

    /// Returns true for screen capture targets.
    pub fn is_screen(&self) -> bool {
        matches!(self, Self::ScreenRegion)
    }

    /// Identifier used in logs and frame tags.
    pub fn label(&self) -> &str {
        match self {
            Self::CameraDevice(id) => id,
            Self::ScreenRegion => "screen",
        }
    }
}

impl std::fmt::Display for CaptureTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CameraDevice(id) => write!(f, "camera:{id}"),
            Self::ScreenRegion => f.write_str("screen"),
        }
    }
}

/// Clockwise rotation to apply when presenting a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoRotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl VideoRotation {
    /// Rotation in degrees.
    pub fn degrees(self) -> u16 {
        match self {
            Self::Rotation0 => 0,
            Self::Rotation90 => 90,
            Self::Rotation180 => 180,
            Self::Rotation270 => 270,
        }
    }
}

/// Category of a reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed input, rejected before any resource was touched.
    InvalidArgument,

    /// The platform could not open or retain the device or screen.
    BackendUnavailable,

    /// The operation is not valid in the current state.
    InvalidState,

    /// The backend stopped producing frames mid-session.
    InternalBackendFailure,

    /// The capture context no longer accepts work.
    ContextClosed,
}

/// Frame format a backend should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFormat {
    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Frames per second.
    pub fps: u32,
}

impl Default for SourceFormat {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
        }
    }
}

/// Options for a video capture interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureOptions {
    /// Rotation attached to frames until changed.
    pub initial_rotation: VideoRotation,

    /// Preferred width / height ratio, if any.
    pub preferred_aspect_ratio: Option<f32>,

    /// Capacity of the event channel.
    pub event_channel_capacity: usize,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            initial_rotation: VideoRotation::Rotation0,
            preferred_aspect_ratio: None,
            event_channel_capacity: crate::EVENT_CHANNEL_CAPACITY,
        }
    }
}

/// Counters for a capture interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStats {
    /// Frames handed to the sink.
    pub frames_delivered: u64,

    /// Frames produced while paused and not delivered.
    pub frames_dropped_paused: u64,

    /// Backends constructed over the lifetime of the interface.
    pub backends_created: u64,

    /// Completed target switches.
    pub target_switches: u64,

    /// Backend open or mid-session failures.
    pub failures: u64,
}
