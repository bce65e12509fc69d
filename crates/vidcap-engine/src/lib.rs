//! Context-affine video capture interface.
//!
//! This crate binds a capturer backend to a frame sink and confines all
//! backend control to one serialized execution context, so camera and
//! screen capture look the same to the media pipeline downstream.

mod binding;
mod bound;
mod context;
mod error;
mod interface;
mod reporter;
mod stats;

pub use binding::CaptureSourceBinding;
pub use bound::{ContextBound, WeakBound};
pub use context::{ContextSet, ExecutionContext, SerialContext, Task, Threads};
pub use error::{VideoCaptureError, VideoCaptureResult};
pub use interface::VideoCaptureInterface;
pub use reporter::{EventHandler, Reporter};
pub use stats::StatsCollector;

pub use vidcap_capture::{FrameSink, PlatformResources};
pub use vidcap_ipc::{CaptureEvent, CaptureState, CaptureTarget, VideoRotation};
