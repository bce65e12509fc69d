//! Capturer backends for camera and screen capture.
//!
//! A backend produces frames from one [`CaptureTarget`] and pushes them into
//! the [`FrameOutput`] it was started with. Backends are built through a
//! [`BackendFactory`] carried by [`PlatformResources`], so platform code can
//! be swapped without the capture interface knowing which driver is in use.

mod error;
mod frame;
mod output;
mod platform;
pub mod synthetic;

pub use error::CaptureError;
pub use frame::{CaptureTimestamp, CapturedFrame};
pub use output::{BackendListener, FrameOutput, FrameRoute, FrameSink};
pub use platform::PlatformResources;
pub use synthetic::{SyntheticBackend, SyntheticFactory};

use vidcap_ipc::CaptureTarget;

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// A platform-specific frame producer for one capture target.
pub trait CapturerBackend: Send {
    /// Open the device and begin pushing frames into `output`.
    fn start(&mut self, output: FrameOutput) -> CaptureResult<()>;

    /// Suspend or resume frame production without releasing the device.
    fn set_producing(&mut self, producing: bool);

    /// Stop capturing and release the device.
    ///
    /// Must not return while a call into the output is still running on a
    /// backend thread.
    fn stop(&mut self) -> CaptureResult<()>;

    /// Check if capture is active.
    fn is_active(&self) -> bool;

    /// Get the source dimensions.
    fn dimensions(&self) -> (u32, u32);

    /// The target this backend was created for.
    fn target(&self) -> &CaptureTarget;

    /// Preferred width / height ratio hint. Ignored by default.
    fn set_preferred_aspect_ratio(&mut self, _ratio: f32) {}
}

/// Builds backends keyed by capture target.
pub trait BackendFactory: Send + Sync {
    /// Create a backend for `target`. No frames flow until it is started.
    fn create(
        &self,
        target: &CaptureTarget,
        resources: &PlatformResources,
    ) -> CaptureResult<Box<dyn CapturerBackend>>;
}
