//! Capture source binding: one target, one backend, one sink.

use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};
use vidcap_capture::{
    BackendListener, CaptureError, CapturerBackend, FrameOutput, FrameRoute, FrameSink,
    PlatformResources,
};
use vidcap_ipc::{CaptureCommand, CaptureEvent, CaptureState, CaptureTarget, VideoRotation};

use crate::bound::WeakBound;
use crate::error::{VideoCaptureError, VideoCaptureResult};
use crate::reporter::Reporter;

struct ActiveBackend {
    backend: Box<dyn CapturerBackend>,
    output: FrameOutput,
}

/// Owns the capture state and the current backend.
///
/// Lives on the capture context; every method is called from there.
pub struct CaptureSourceBinding {
    target: CaptureTarget,
    state: CaptureState,
    resources: Arc<PlatformResources>,
    route: Arc<FrameRoute>,
    listener: Arc<dyn BackendListener>,
    reporter: Arc<Reporter>,
    backend: Option<ActiveBackend>,
    generation: u64,
    preferred_aspect_ratio: Option<f32>,
}

impl CaptureSourceBinding {
    /// Create a binding. No backend is constructed until it is started.
    pub fn new(
        target: CaptureTarget,
        resources: Arc<PlatformResources>,
        route: Arc<FrameRoute>,
        listener: Arc<dyn BackendListener>,
        reporter: Arc<Reporter>,
        preferred_aspect_ratio: Option<f32>,
    ) -> Self {
        debug!(%target, "Capture source binding created");
        Self {
            target,
            state: CaptureState::Created,
            resources,
            route,
            listener,
            reporter,
            backend: None,
            generation: 0,
            preferred_aspect_ratio,
        }
    }

    /// Current state.
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Current target.
    pub fn target(&self) -> &CaptureTarget {
        &self.target
    }

    /// Returns true while a backend is held.
    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Apply a command and report its outcome.
    pub fn handle_command(&mut self, command: CaptureCommand) {
        debug!(command = command.name(), state = %self.state, "Handling command");

        let result = match command {
            CaptureCommand::Start => self.start(),
            CaptureCommand::Stop => self.stop(),
            CaptureCommand::Pause => self.pause(),
            CaptureCommand::Resume => self.resume(),
            CaptureCommand::SwitchTarget(target) => self.switch_target(target),
            CaptureCommand::SetOutputRotation(rotation) => {
                self.set_output_rotation(rotation);
                Ok(())
            }
            CaptureCommand::SetPreferredAspectRatio(ratio) => {
                self.set_preferred_aspect_ratio(ratio)
            }
        };

        if let Err(e) = result {
            self.report_error(&e);
        }
    }

    /// Start capture, or resume if paused. No-op while active.
    #[instrument(name = "binding_start", skip(self), fields(capture = %self.target))]
    pub fn start(&mut self) -> VideoCaptureResult<()> {
        match self.state {
            CaptureState::Active => {
                debug!("Already active, ignoring start");
                Ok(())
            }
            CaptureState::Paused => self.resume(),
            CaptureState::Created | CaptureState::Stopped | CaptureState::Failed => {
                if let Err(e) = self.open_backend(true) {
                    self.transition_to(CaptureState::Failed);
                    return Err(e);
                }
                self.route.set_paused(false);
                self.transition_to(CaptureState::Active);
                Ok(())
            }
        }
    }

    /// Stop capture and release the backend. Idempotent.
    #[instrument(name = "binding_stop", skip(self))]
    pub fn stop(&mut self) -> VideoCaptureResult<()> {
        if self.state == CaptureState::Stopped {
            debug!("Already stopped, ignoring stop");
            return Ok(());
        }

        self.close_backend();
        self.route.set_paused(false);
        self.transition_to(CaptureState::Stopped);
        Ok(())
    }

    /// Suspend delivery, keeping the backend open.
    pub fn pause(&mut self) -> VideoCaptureResult<()> {
        if self.state != CaptureState::Active {
            return Err(VideoCaptureError::InvalidState {
                operation: "pause",
                state: self.state,
            });
        }

        self.route.set_paused(true);
        if let Some(active) = self.backend.as_mut() {
            active.backend.set_producing(false);
        }
        self.transition_to(CaptureState::Paused);
        Ok(())
    }

    /// Resume delivery after a pause.
    pub fn resume(&mut self) -> VideoCaptureResult<()> {
        if self.state != CaptureState::Paused {
            return Err(VideoCaptureError::InvalidState {
                operation: "resume",
                state: self.state,
            });
        }

        if let Some(active) = self.backend.as_mut() {
            active.backend.set_producing(true);
        }
        self.route.set_paused(false);
        self.transition_to(CaptureState::Active);
        Ok(())
    }

    /// Replace the backend with one for `target`, keeping the sink.
    ///
    /// The old backend is fully torn down before the new one is built, so no
    /// frame from it can follow a frame from the new one.
    #[instrument(name = "binding_switch_target", skip(self, target), fields(from = %self.target, to = %target))]
    pub fn switch_target(&mut self, target: CaptureTarget) -> VideoCaptureResult<()> {
        let previous = self.state;
        info!("Switching capture target");

        self.close_backend();
        self.target = target.clone();
        self.reporter.publish_target(target.clone());
        self.reporter.send(CaptureEvent::TargetSwitched { target });

        match previous {
            CaptureState::Active | CaptureState::Paused => {
                if let Err(e) = self.open_backend(previous.is_active()) {
                    self.transition_to(CaptureState::Failed);
                    return Err(e);
                }
            }
            CaptureState::Failed => self.start()?,
            CaptureState::Created | CaptureState::Stopped => {}
        }

        self.reporter.stats().record_target_switch();
        Ok(())
    }

    /// Set the rotation hint for newly delivered frames.
    pub fn set_output_rotation(&mut self, rotation: VideoRotation) {
        if self.route.rotation() == rotation {
            return;
        }
        debug!(degrees = rotation.degrees(), "Output rotation changed");
        self.route.set_rotation(rotation);
        self.reporter.send(CaptureEvent::RotationChanged(rotation));
    }

    /// Set the preferred width / height ratio for current and future backends.
    pub fn set_preferred_aspect_ratio(&mut self, ratio: f32) -> VideoCaptureResult<()> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(VideoCaptureError::InvalidArgument(format!(
                "aspect ratio must be positive and finite, got {ratio}"
            )));
        }

        self.preferred_aspect_ratio = Some(ratio);
        if let Some(active) = self.backend.as_mut() {
            active.backend.set_preferred_aspect_ratio(ratio);
        }
        Ok(())
    }

    /// Route frames to a different sink from the next frame on.
    pub fn set_sink(&mut self, sink: Arc<dyn FrameSink>) {
        debug!("Frame sink replaced");
        self.route.set_sink(sink);
    }

    /// Called when backend `generation` delivered its first frame.
    pub fn on_first_frame(&mut self, generation: u64) {
        if generation != self.generation || self.backend.is_none() {
            return;
        }
        debug!(generation, capture = %self.target, "First frame delivered");
        self.reporter.send(CaptureEvent::FirstFrame {
            target: self.target.clone(),
        });
    }

    /// Called when backend `generation` failed mid-session.
    pub fn on_backend_failure(&mut self, generation: u64, source: CaptureError) {
        if generation != self.generation || self.backend.is_none() {
            debug!(generation, current = self.generation, "Ignoring failure from stale backend");
            return;
        }

        error!(generation, capture = %self.target, error = %source, "Capture backend failed");
        self.close_backend();
        self.reporter.stats().record_failure();
        self.transition_to(CaptureState::Failed);
        self.report_error(&VideoCaptureError::InternalBackendFailure(source));
    }

    fn open_backend(&mut self, producing: bool) -> VideoCaptureResult<()> {
        debug_assert!(self.backend.is_none(), "previous backend not released");
        self.generation += 1;

        let unavailable = |target: &CaptureTarget, source| VideoCaptureError::BackendUnavailable {
            target: target.clone(),
            source,
        };

        let mut backend = match self.resources.create_backend(&self.target) {
            Ok(backend) => backend,
            Err(source) => {
                self.reporter.stats().record_failure();
                return Err(unavailable(&self.target, source));
            }
        };
        self.reporter.stats().record_backend_created();

        if let Some(ratio) = self.preferred_aspect_ratio {
            backend.set_preferred_aspect_ratio(ratio);
        }
        backend.set_producing(producing);

        let output = FrameOutput::new(
            self.generation,
            Arc::clone(&self.route),
            Arc::clone(&self.listener),
        );
        if let Err(source) = backend.start(output.clone()) {
            output.close();
            self.reporter.stats().record_failure();
            return Err(unavailable(&self.target, source));
        }

        let (width, height) = backend.dimensions();
        info!(
            generation = self.generation,
            capture = %self.target,
            width,
            height,
            "Capture backend opened"
        );

        self.backend = Some(ActiveBackend { backend, output });
        Ok(())
    }

    /// Tear down the backend: close its output (waiting out any delivery in
    /// flight), stop it, then release it.
    fn close_backend(&mut self) {
        let Some(ActiveBackend {
            mut backend,
            output,
        }) = self.backend.take()
        else {
            return;
        };

        output.close();
        if let Err(e) = backend.stop() {
            warn!(generation = self.generation, "Backend stop failed: {}", e);
        }
        drop(backend);

        info!(generation = self.generation, capture = %self.target, "Capture backend released");
    }

    fn transition_to(&mut self, new_state: CaptureState) {
        let previous = std::mem::replace(&mut self.state, new_state);
        if previous == new_state {
            return;
        }

        self.reporter.publish_state(new_state);
        debug!(
            previous = %previous,
            current = %new_state,
            "State transition"
        );

        self.reporter.send(CaptureEvent::StateChanged {
            previous,
            current: new_state,
        });
    }

    fn report_error(&self, error: &VideoCaptureError) {
        match error {
            VideoCaptureError::InvalidState { .. } | VideoCaptureError::InvalidArgument(_) => {
                warn!("Capture control rejected: {}", error)
            }
            _ => error!("Capture error: {}", error),
        }

        self.reporter.send(CaptureEvent::Error {
            kind: error.kind(),
            message: error.to_string(),
        });
    }
}

impl Drop for CaptureSourceBinding {
    fn drop(&mut self) {
        self.close_backend();
        debug!(capture = %self.target, "Capture source binding destroyed");
    }
}

/// Routes backend notifications back onto the capture context.
pub(crate) struct BindingListener {
    binding: WeakBound<CaptureSourceBinding>,
}

impl BindingListener {
    pub(crate) fn new(binding: WeakBound<CaptureSourceBinding>) -> Self {
        Self { binding }
    }
}

impl BackendListener for BindingListener {
    fn first_frame(&self, generation: u64) {
        if let Err(e) = self
            .binding
            .perform(move |binding| binding.on_first_frame(generation))
        {
            debug!("Dropping first frame notice: {}", e);
        }
    }

    fn backend_failed(&self, generation: u64, error: CaptureError) {
        if let Err(e) = self
            .binding
            .perform(move |binding| binding.on_backend_failure(generation, error))
        {
            warn!("Dropping backend failure report: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use vidcap_capture::{CapturedFrame, SyntheticFactory};
    use vidcap_ipc::{ErrorKind, SourceFormat};

    use super::*;
    use crate::context::SerialContext;

    struct NullListener;

    impl BackendListener for NullListener {
        fn first_frame(&self, _generation: u64) {}
        fn backend_failed(&self, _generation: u64, _error: CaptureError) {}
    }

    #[derive(Default)]
    struct CountingSink {
        frames: Mutex<u64>,
    }

    impl FrameSink for CountingSink {
        fn on_frame(&self, _frame: &CapturedFrame, _rotation: VideoRotation) {
            *self.frames.lock() += 1;
        }
    }

    struct Fixture {
        binding: CaptureSourceBinding,
        factory: SyntheticFactory,
        events: crossbeam_channel::Receiver<CaptureEvent>,
        _control: Arc<SerialContext>,
    }

    fn fixture(target: CaptureTarget) -> Fixture {
        let factory = SyntheticFactory::new(SourceFormat {
            width: 16,
            height: 8,
            fps: 100,
        });
        let control = SerialContext::spawn("test-binding-control").unwrap();
        let (event_tx, events) = crossbeam_channel::unbounded();
        let reporter = Arc::new(Reporter::new(target.clone(), event_tx, control.clone()));
        let route = Arc::new(FrameRoute::new(
            Arc::new(CountingSink::default()),
            VideoRotation::Rotation0,
        ));

        let binding = CaptureSourceBinding::new(
            target,
            Arc::new(PlatformResources::new(factory.clone())),
            route,
            Arc::new(NullListener),
            reporter,
            None,
        );

        Fixture {
            binding,
            factory,
            events,
            _control: control,
        }
    }

    fn next_state(state: CaptureState, command: &CaptureCommand) -> CaptureState {
        match (state, command) {
            (_, CaptureCommand::Stop) => CaptureState::Stopped,
            (_, CaptureCommand::Start) => CaptureState::Active,
            (CaptureState::Active, CaptureCommand::Pause) => CaptureState::Paused,
            (CaptureState::Paused, CaptureCommand::Resume) => CaptureState::Active,
            (state, _) => state,
        }
    }

    #[test]
    fn test_state_machine_follows_model() {
        let mut fx = fixture(CaptureTarget::camera("cam0"));
        let commands = [
            CaptureCommand::Pause,
            CaptureCommand::Start,
            CaptureCommand::Start,
            CaptureCommand::Pause,
            CaptureCommand::Pause,
            CaptureCommand::Start,
            CaptureCommand::Resume,
            CaptureCommand::Stop,
            CaptureCommand::Resume,
            CaptureCommand::Stop,
            CaptureCommand::Start,
            CaptureCommand::Pause,
            CaptureCommand::Resume,
        ];

        let mut expected = CaptureState::Created;
        for command in commands {
            expected = next_state(expected, &command);
            fx.binding.handle_command(command);
            assert_eq!(fx.binding.state(), expected);
            assert_eq!(fx.binding.has_backend(), expected.holds_backend());
        }
    }

    #[test]
    fn test_start_twice_builds_one_backend() {
        let mut fx = fixture(CaptureTarget::camera("cam0"));

        fx.binding.start().unwrap();
        fx.binding.start().unwrap();

        assert_eq!(fx.factory.backends_created(), 1);
        assert_eq!(fx.factory.live_backends(), 1);
    }

    #[test]
    fn test_denied_start_fails_and_recovers() {
        let mut fx = fixture(CaptureTarget::camera("cam0"));
        fx.factory.deny(CaptureTarget::camera("cam0"));

        let err = fx.binding.start().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        assert_eq!(fx.binding.state(), CaptureState::Failed);
        assert!(!fx.binding.has_backend());

        fx.factory.allow(&CaptureTarget::camera("cam0"));
        fx.binding.start().unwrap();
        assert_eq!(fx.binding.state(), CaptureState::Active);
    }

    #[test]
    fn test_switch_from_stopped_only_records_target() {
        let mut fx = fixture(CaptureTarget::camera("cam0"));
        fx.binding.start().unwrap();
        fx.binding.stop().unwrap();

        fx.binding.switch_target(CaptureTarget::ScreenRegion).unwrap();

        assert_eq!(fx.binding.state(), CaptureState::Stopped);
        assert_eq!(fx.binding.target(), &CaptureTarget::ScreenRegion);
        assert_eq!(fx.factory.backends_created(), 1);
        assert_eq!(fx.factory.live_backends(), 0);
    }

    #[test]
    fn test_switch_while_paused_stays_paused() {
        let mut fx = fixture(CaptureTarget::camera("cam0"));
        fx.binding.start().unwrap();
        fx.binding.pause().unwrap();

        fx.binding.switch_target(CaptureTarget::ScreenRegion).unwrap();

        assert_eq!(fx.binding.state(), CaptureState::Paused);
        assert_eq!(fx.factory.backends_created(), 2);
        assert_eq!(fx.factory.live_backends(), 1);
    }

    #[test]
    fn test_stale_failure_is_ignored() {
        let mut fx = fixture(CaptureTarget::camera("cam0"));
        fx.binding.start().unwrap();
        fx.binding.switch_target(CaptureTarget::ScreenRegion).unwrap();

        fx.binding.on_backend_failure(1, CaptureError::DeviceLost);
        assert_eq!(fx.binding.state(), CaptureState::Active);

        fx.binding.on_backend_failure(2, CaptureError::DeviceLost);
        assert_eq!(fx.binding.state(), CaptureState::Failed);
        assert!(!fx.binding.has_backend());

        let kinds: Vec<_> = fx.events.try_iter().filter_map(|e| e.error_kind()).collect();
        assert_eq!(kinds, vec![ErrorKind::InternalBackendFailure]);
    }

    #[test]
    fn test_invalid_aspect_ratio_rejected() {
        let mut fx = fixture(CaptureTarget::ScreenRegion);

        fx.binding
            .handle_command(CaptureCommand::SetPreferredAspectRatio(-1.0));

        let kinds: Vec<_> = fx.events.try_iter().filter_map(|e| e.error_kind()).collect();
        assert_eq!(kinds, vec![ErrorKind::InvalidArgument]);
    }
}
