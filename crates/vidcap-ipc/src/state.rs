//! Capture state machine types.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a capture source binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureState {
    /// Created, capture never started.
    #[default]
    Created,

    /// Backend open and frames flowing to the sink.
    Active,

    /// Backend open but frame delivery suspended.
    Paused,

    /// No backend; capture stopped.
    Stopped,

    /// Backend could not be opened or stopped unexpectedly.
    Failed,
}

impl CaptureState {
    /// Returns true if frames are flowing.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns true if delivery is suspended.
    pub fn is_paused(self) -> bool {
        matches!(self, Self::Paused)
    }

    /// Returns true if a backend is held in this state.
    pub fn holds_backend(self) -> bool {
        matches!(self, Self::Active | Self::Paused)
    }

    /// Returns true if the binding is in the failed state.
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Returns a simple string representation of the state.
    pub fn name(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Active => "Active",
            Self::Paused => "Paused",
            Self::Stopped => "Stopped",
            Self::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_created() {
        assert_eq!(CaptureState::default(), CaptureState::Created);
    }

    #[test]
    fn test_holds_backend() {
        assert!(CaptureState::Active.holds_backend());
        assert!(CaptureState::Paused.holds_backend());
        assert!(!CaptureState::Created.holds_backend());
        assert!(!CaptureState::Stopped.holds_backend());
        assert!(!CaptureState::Failed.holds_backend());
    }

    #[test]
    fn test_only_failed_is_failed() {
        assert!(CaptureState::Failed.is_failed());
        assert!(!CaptureState::Stopped.is_failed());
        assert!(!CaptureState::Active.is_failed());
    }
}
