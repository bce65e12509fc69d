//! The video capture interface façade.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use tracing::{debug, info, instrument};
use vidcap_capture::{FrameRoute, FrameSink, PlatformResources};
use vidcap_ipc::{
    event_channel, CaptureCommand, CaptureEvent, CaptureOptions, CaptureState, CaptureStats,
    CaptureTarget, VideoRotation,
};

use crate::binding::{BindingListener, CaptureSourceBinding};
use crate::bound::ContextBound;
use crate::context::Threads;
use crate::error::{VideoCaptureError, VideoCaptureResult};
use crate::reporter::Reporter;

/// Unified camera / screen capture bound to one frame sink.
///
/// Control methods post work to the capture context and return at once.
/// Outcomes arrive on [`events`](Self::events), through the handler set with
/// [`set_event_handler`](Self::set_event_handler), and in [`state`](Self::state).
/// Dropping the interface tears the backend down before `drop` returns.
pub struct VideoCaptureInterface {
    binding: ContextBound<CaptureSourceBinding>,
    reporter: Arc<Reporter>,
    route: Arc<FrameRoute>,
    event_rx: Receiver<CaptureEvent>,
}

impl VideoCaptureInterface {
    /// Create an interface with default options. Capture is not started.
    pub fn create(
        threads: Arc<dyn Threads>,
        sink: Option<Arc<dyn FrameSink>>,
        target: CaptureTarget,
        resources: Arc<PlatformResources>,
    ) -> VideoCaptureResult<Self> {
        Self::create_with_options(threads, sink, target, resources, CaptureOptions::default())
    }

    /// Create an interface with explicit options.
    #[instrument(name = "video_capture_create", skip_all, fields(capture = %target))]
    pub fn create_with_options(
        threads: Arc<dyn Threads>,
        sink: Option<Arc<dyn FrameSink>>,
        target: CaptureTarget,
        resources: Arc<PlatformResources>,
        options: CaptureOptions,
    ) -> VideoCaptureResult<Self> {
        let sink = sink.ok_or_else(|| {
            VideoCaptureError::InvalidArgument("a frame sink is required".to_string())
        })?;
        if let Some(ratio) = options.preferred_aspect_ratio {
            if !ratio.is_finite() || ratio <= 0.0 {
                return Err(VideoCaptureError::InvalidArgument(format!(
                    "aspect ratio must be positive and finite, got {ratio}"
                )));
            }
        }

        let (event_tx, event_rx) = event_channel(options.event_channel_capacity);
        let reporter = Arc::new(Reporter::new(
            target.clone(),
            event_tx,
            threads.control_context(),
        ));
        let route = Arc::new(FrameRoute::new(sink, options.initial_rotation));

        let binding = {
            let reporter = Arc::clone(&reporter);
            let route = Arc::clone(&route);
            let aspect_ratio = options.preferred_aspect_ratio;
            ContextBound::new(threads.capture_context(), move |weak| {
                CaptureSourceBinding::new(
                    target,
                    resources,
                    route,
                    Arc::new(BindingListener::new(weak)),
                    reporter,
                    aspect_ratio,
                )
            })?
        };

        info!("Video capture interface created");

        Ok(Self {
            binding,
            reporter,
            route,
            event_rx,
        })
    }

    /// Start capture, or resume if paused.
    pub fn start(&self) -> VideoCaptureResult<()> {
        self.post(CaptureCommand::Start)
    }

    /// Stop capture and release the backend.
    pub fn stop(&self) -> VideoCaptureResult<()> {
        self.post(CaptureCommand::Stop)
    }

    /// Suspend frame delivery. Only valid while active.
    pub fn pause(&self) -> VideoCaptureResult<()> {
        self.post(CaptureCommand::Pause)
    }

    /// Resume frame delivery. Only valid while paused.
    pub fn resume(&self) -> VideoCaptureResult<()> {
        self.post(CaptureCommand::Resume)
    }

    /// Switch to a different camera or to the screen, keeping the sink.
    pub fn switch_target(&self, target: CaptureTarget) -> VideoCaptureResult<()> {
        self.post(CaptureCommand::SwitchTarget(target))
    }

    /// Set the rotation attached to newly delivered frames.
    pub fn set_output_rotation(&self, rotation: VideoRotation) -> VideoCaptureResult<()> {
        self.post(CaptureCommand::SetOutputRotation(rotation))
    }

    /// Hint the preferred width / height ratio to the backend.
    pub fn set_preferred_aspect_ratio(&self, ratio: f32) -> VideoCaptureResult<()> {
        self.post(CaptureCommand::SetPreferredAspectRatio(ratio))
    }

    /// Route frames to a different sink.
    pub fn set_output(&self, sink: Arc<dyn FrameSink>) -> VideoCaptureResult<()> {
        self.binding.perform(move |binding| binding.set_sink(sink))
    }

    /// Install a handler invoked on the control context for every event.
    pub fn set_event_handler(&self, handler: impl Fn(&CaptureEvent) + Send + Sync + 'static) {
        self.reporter.set_handler(Some(Arc::new(handler)));
    }

    /// Remove the event handler.
    pub fn clear_event_handler(&self) {
        self.reporter.set_handler(None);
    }

    /// Events reported by the capture context, in order.
    ///
    /// The channel is bounded by `CaptureOptions::event_channel_capacity`.
    /// Owners that rely on the handler or [`state`](Self::state) instead may
    /// leave it undrained; events that do not fit are dropped.
    pub fn events(&self) -> &Receiver<CaptureEvent> {
        &self.event_rx
    }

    /// Last state committed on the capture context.
    pub fn state(&self) -> CaptureState {
        self.reporter.state()
    }

    /// Current capture target.
    pub fn target(&self) -> CaptureTarget {
        self.reporter.target()
    }

    /// Returns true if the current target is the screen.
    pub fn is_screen_capture(&self) -> bool {
        self.reporter.target().is_screen()
    }

    /// Frame and backend counters.
    pub fn stats(&self) -> CaptureStats {
        self.reporter.stats().snapshot(&self.route)
    }

    /// Block until every operation posted so far has been applied.
    ///
    /// Returns immediately when called from the capture context.
    pub fn wait_idle(&self) -> VideoCaptureResult<()> {
        let context = self.binding.context();
        if context.is_current() {
            return Ok(());
        }

        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        context.post(Box::new(move || {
            let _ = done_tx.send(());
        }))?;
        done_rx
            .recv()
            .map_err(|_| VideoCaptureError::ContextClosed(context.name().to_string()))
    }

    fn post(&self, command: CaptureCommand) -> VideoCaptureResult<()> {
        debug!(command = command.name(), "Posting capture command");
        self.binding
            .perform(move |binding| binding.handle_command(command))
    }
}

impl Drop for VideoCaptureInterface {
    fn drop(&mut self) {
        debug!("Destroying video capture interface");
    }
}
