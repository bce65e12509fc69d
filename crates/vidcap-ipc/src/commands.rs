//! Commands posted from the façade to the capture context.

use serde::{Deserialize, Serialize};

use crate::types::{CaptureTarget, VideoRotation};

/// Control operations, applied in the order they were posted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CaptureCommand {
    /// Start (or resume) capture from the current target.
    Start,

    /// Stop capture and release the backend.
    Stop,

    /// Suspend frame delivery, keeping the backend open.
    Pause,

    /// Resume frame delivery after a pause.
    Resume,

    /// Replace the backend with one for a new target.
    SwitchTarget(CaptureTarget),

    /// Orientation hint attached to newly delivered frames.
    SetOutputRotation(VideoRotation),

    /// Preferred width / height ratio hint for the backend.
    SetPreferredAspectRatio(f32),
}

impl CaptureCommand {
    /// Short name used in logs and `InvalidState` reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::SwitchTarget(_) => "switch_target",
            Self::SetOutputRotation(_) => "set_output_rotation",
            Self::SetPreferredAspectRatio(_) => "set_preferred_aspect_ratio",
        }
    }
}
