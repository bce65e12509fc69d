//! Frame routing from a backend to the sink.
//!
//! Every backend instance gets its own [`FrameOutput`]. The output is a gate:
//! while open, [`FrameOutput::deliver`] forwards frames synchronously to the
//! sink held by the shared [`FrameRoute`]; once closed, nothing passes.
//! Closing waits for an in-flight delivery to return, which is what lets the
//! owner tear a backend down and know no frame from it will arrive later.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};
use vidcap_ipc::VideoRotation;

use crate::error::CaptureError;
use crate::frame::CapturedFrame;

/// Destination for captured frames.
///
/// Called on the backend's frame-producing thread. Implementations should
/// hand the frame off quickly; the backend is blocked until they return.
pub trait FrameSink: Send + Sync {
    /// Receive one frame together with the rotation hint in effect.
    fn on_frame(&self, frame: &CapturedFrame, rotation: VideoRotation);
}

/// Notifications raised by a [`FrameOutput`] outside the frame path.
pub trait BackendListener: Send + Sync {
    /// The first frame of the given backend generation reached the sink.
    fn first_frame(&self, generation: u64);

    /// The backend of the given generation failed mid-session.
    fn backend_failed(&self, generation: u64, error: CaptureError);
}

/// Routing state shared by every output of one capture interface.
pub struct FrameRoute {
    sink: RwLock<Arc<dyn FrameSink>>,
    rotation: RwLock<VideoRotation>,
    paused: AtomicBool,
    frames_delivered: AtomicU64,
    frames_dropped_paused: AtomicU64,
}

impl FrameRoute {
    /// Create a route to the given sink.
    pub fn new(sink: Arc<dyn FrameSink>, rotation: VideoRotation) -> Self {
        Self {
            sink: RwLock::new(sink),
            rotation: RwLock::new(rotation),
            paused: AtomicBool::new(false),
            frames_delivered: AtomicU64::new(0),
            frames_dropped_paused: AtomicU64::new(0),
        }
    }

    /// Replace the sink. Waits for a delivery in progress to finish.
    pub fn set_sink(&self, sink: Arc<dyn FrameSink>) {
        *self.sink.write() = sink;
    }

    /// Set the rotation attached to subsequent frames.
    pub fn set_rotation(&self, rotation: VideoRotation) {
        *self.rotation.write() = rotation;
    }

    /// Current rotation hint.
    pub fn rotation(&self) -> VideoRotation {
        *self.rotation.read()
    }

    /// Suspend or resume delivery.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Returns true if delivery is suspended.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Frames handed to the sink so far.
    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered.load(Ordering::Relaxed)
    }

    /// Frames discarded because delivery was paused.
    pub fn frames_dropped_paused(&self) -> u64 {
        self.frames_dropped_paused.load(Ordering::Relaxed)
    }

    fn forward(&self, frame: &CapturedFrame) {
        let rotation = self.rotation();
        self.sink.read().on_frame(frame, rotation);
        self.frames_delivered.fetch_add(1, Ordering::Relaxed);
    }
}

enum Gate {
    Open { delivered: u64 },
    Closed,
}

struct OutputInner {
    generation: u64,
    gate: Mutex<Gate>,
    route: Arc<FrameRoute>,
    listener: Arc<dyn BackendListener>,
}

/// Handle a backend uses to push frames. Cheap to clone.
#[derive(Clone)]
pub struct FrameOutput {
    inner: Arc<OutputInner>,
}

impl FrameOutput {
    /// Create an open output for backend `generation`.
    pub fn new(
        generation: u64,
        route: Arc<FrameRoute>,
        listener: Arc<dyn BackendListener>,
    ) -> Self {
        Self {
            inner: Arc::new(OutputInner {
                generation,
                gate: Mutex::new(Gate::Open { delivered: 0 }),
                route,
                listener,
            }),
        }
    }

    /// Backend generation this output belongs to.
    pub fn generation(&self) -> u64 {
        self.inner.generation
    }

    /// Forward a frame to the sink on the calling thread.
    ///
    /// Returns false once the output is closed; the backend should stop
    /// producing at that point.
    pub fn deliver(&self, frame: CapturedFrame) -> bool {
        let first = {
            let mut gate = self.inner.gate.lock();
            let Gate::Open { delivered } = &mut *gate else {
                trace!(generation = self.inner.generation, "Frame rejected, output closed");
                return false;
            };

            if self.inner.route.is_paused() {
                self.inner
                    .route
                    .frames_dropped_paused
                    .fetch_add(1, Ordering::Relaxed);
                return true;
            }

            self.inner.route.forward(&frame);
            *delivered += 1;
            *delivered == 1
        };

        if first {
            self.inner.listener.first_frame(self.inner.generation);
        }
        true
    }

    /// Report an unrecoverable backend failure.
    ///
    /// Closes the output, so no further frame reaches the sink, and notifies
    /// the listener once. Failures after close are ignored.
    pub fn fail(&self, error: CaptureError) {
        let was_open = {
            let mut gate = self.inner.gate.lock();
            let was_open = matches!(*gate, Gate::Open { .. });
            *gate = Gate::Closed;
            was_open
        };

        if was_open {
            warn!(generation = self.inner.generation, %error, "Backend failed");
            self.inner
                .listener
                .backend_failed(self.inner.generation, error);
        }
    }

    /// Close the output. Blocks until a delivery in progress has returned.
    pub fn close(&self) {
        let mut gate = self.inner.gate.lock();
        if let Gate::Open { delivered } = *gate {
            debug!(
                generation = self.inner.generation,
                delivered, "Frame output closed"
            );
        }
        *gate = Gate::Closed;
    }

    /// Returns true while frames are accepted.
    pub fn is_open(&self) -> bool {
        matches!(*self.inner.gate.lock(), Gate::Open { .. })
    }
}

impl std::fmt::Debug for FrameOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameOutput")
            .field("generation", &self.inner.generation)
            .field("open", &self.is_open())
            .finish()
    }
}
