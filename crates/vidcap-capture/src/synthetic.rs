//! Synthetic test-pattern backend.
//!
//! Produces NV12 frames on a dedicated thread at the configured rate. It is
//! the default backend on platforms without a native driver binding, and it
//! can simulate device denial and mid-session loss.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument};
use vidcap_ipc::{CaptureTarget, SourceFormat};

use crate::error::CaptureError;
use crate::frame::{CaptureTimestamp, CapturedFrame};
use crate::output::FrameOutput;
use crate::platform::PlatformResources;
use crate::{BackendFactory, CaptureResult, CapturerBackend};

/// Largest width or height a synthetic backend will produce.
pub const MAX_DIMENSION: u32 = 8192;

/// Factory for [`SyntheticBackend`]s.
///
/// Clones share their denial list and counters, so a test can keep one
/// clone and hand another to [`PlatformResources`].
#[derive(Debug, Clone, Default)]
pub struct SyntheticFactory {
    format: SourceFormat,
    fail_after: Option<u64>,
    denied: Arc<Mutex<HashSet<CaptureTarget>>>,
    created: Arc<AtomicU64>,
    live: Arc<AtomicUsize>,
}

impl SyntheticFactory {
    /// Create a factory producing the given format.
    pub fn new(format: SourceFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    /// Make every backend fail with a lost device after `frames` frames.
    pub fn fail_after_frames(mut self, frames: u64) -> Self {
        self.fail_after = Some(frames);
        self
    }

    /// Refuse to open `target`, as if permission were denied.
    pub fn deny(&self, target: CaptureTarget) {
        self.denied.lock().insert(target);
    }

    /// Allow a previously denied target again.
    pub fn allow(&self, target: &CaptureTarget) {
        self.denied.lock().remove(target);
    }

    /// Backends constructed so far.
    pub fn backends_created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }

    /// Backends constructed and not yet dropped.
    pub fn live_backends(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl BackendFactory for SyntheticFactory {
    fn create(
        &self,
        target: &CaptureTarget,
        resources: &PlatformResources,
    ) -> CaptureResult<Box<dyn CapturerBackend>> {
        if let CaptureTarget::CameraDevice(id) = target {
            if id.is_empty() {
                return Err(CaptureError::SourceNotFound(target.to_string()));
            }
        }

        let format = resources
            .handle::<SourceFormat>()
            .map(|format| *format)
            .unwrap_or(self.format);
        check_format(&format)?;

        self.created.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(SyntheticBackend {
            target: Arc::new(target.clone()),
            format,
            dimensions: Arc::new(Mutex::new((format.width, format.height))),
            denied: self.denied.lock().contains(target),
            fail_after: self.fail_after,
            producing: Arc::new(AtomicBool::new(true)),
            should_stop: Arc::new(AtomicBool::new(false)),
            worker: None,
            output: None,
            live: Arc::clone(&self.live),
        }))
    }
}

/// A backend producing a moving luma test pattern.
pub struct SyntheticBackend {
    target: Arc<CaptureTarget>,
    format: SourceFormat,
    dimensions: Arc<Mutex<(u32, u32)>>,
    denied: bool,
    fail_after: Option<u64>,
    producing: Arc<AtomicBool>,
    should_stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    output: Option<FrameOutput>,
    live: Arc<AtomicUsize>,
}

impl CapturerBackend for SyntheticBackend {
    #[instrument(name = "synthetic_start", skip_all, fields(source = %self.target))]
    fn start(&mut self, output: FrameOutput) -> CaptureResult<()> {
        if self.worker.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }
        if self.denied {
            return Err(CaptureError::PermissionDenied);
        }

        info!(
            width = self.format.width,
            height = self.format.height,
            fps = self.format.fps,
            "Starting synthetic capture"
        );

        self.should_stop.store(false, Ordering::SeqCst);

        let worker = Worker {
            target: Arc::clone(&self.target),
            fps: self.format.fps,
            dimensions: Arc::clone(&self.dimensions),
            fail_after: self.fail_after,
            producing: Arc::clone(&self.producing),
            should_stop: Arc::clone(&self.should_stop),
            output: output.clone(),
        };

        let handle = thread::Builder::new()
            .name(format!("synthetic-{}", self.target.label()))
            .spawn(move || {
                let source = Arc::clone(&worker.target);
                let output = worker.output.clone();
                if panic::catch_unwind(AssertUnwindSafe(|| worker.run())).is_err() {
                    error!(source = %source, "Synthetic worker panicked");
                    output.fail(CaptureError::Platform {
                        message: "synthetic capture thread panicked".to_string(),
                    });
                }
            })?;

        self.worker = Some(handle);
        self.output = Some(output);
        Ok(())
    }

    fn set_producing(&mut self, producing: bool) {
        debug!(source = %self.target, producing, "Synthetic production toggled");
        self.producing.store(producing, Ordering::SeqCst);
    }

    #[instrument(name = "synthetic_stop", skip_all, fields(source = %self.target))]
    fn stop(&mut self) -> CaptureResult<()> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };

        info!("Stopping synthetic capture");
        self.should_stop.store(true, Ordering::SeqCst);
        if handle.join().is_err() {
            return Err(CaptureError::Platform {
                message: "synthetic capture thread panicked".to_string(),
            });
        }
        self.output = None;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.worker.is_some()
    }

    fn dimensions(&self) -> (u32, u32) {
        *self.dimensions.lock()
    }

    fn target(&self) -> &CaptureTarget {
        &self.target
    }

    fn set_preferred_aspect_ratio(&mut self, ratio: f32) {
        let cropped = crop_to_aspect(self.format.width, self.format.height, ratio);
        debug!(source = %self.target, ratio, ?cropped, "Applying aspect ratio");
        *self.dimensions.lock() = cropped;
    }
}

impl Drop for SyntheticBackend {
    fn drop(&mut self) {
        let _ = self.stop();
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Worker {
    target: Arc<CaptureTarget>,
    fps: u32,
    dimensions: Arc<Mutex<(u32, u32)>>,
    fail_after: Option<u64>,
    producing: Arc<AtomicBool>,
    should_stop: Arc<AtomicBool>,
    output: FrameOutput,
}

impl Worker {
    fn run(self) {
        let frame_interval = Duration::from_secs(1) / self.fps.max(1);
        let start_time = Instant::now();
        let mut sequence: u64 = 0;

        while !self.should_stop.load(Ordering::SeqCst) {
            let tick = Instant::now();

            if self.producing.load(Ordering::SeqCst) {
                if self.fail_after.is_some_and(|limit| sequence >= limit) {
                    self.output.fail(CaptureError::DeviceLost);
                    break;
                }

                let (width, height) = *self.dimensions.lock();
                let Some(data) = test_pattern(width, height, sequence) else {
                    self.output.fail(CaptureError::NotSupported(format!(
                        "frame size {width}x{height}"
                    )));
                    break;
                };
                let frame = CapturedFrame::new(
                    data,
                    width,
                    height,
                    CaptureTimestamp::now(start_time),
                    sequence,
                    Arc::clone(&self.target),
                );

                if !self.output.deliver(frame) {
                    break;
                }
                sequence += 1;
            }

            let elapsed = tick.elapsed();
            if elapsed < frame_interval {
                thread::sleep(frame_interval - elapsed);
            }
        }

        debug!(
            source = %self.target,
            generation = self.output.generation(),
            frames = sequence,
            "Synthetic worker exited"
        );
    }
}

fn check_format(format: &SourceFormat) -> CaptureResult<()> {
    let SourceFormat { width, height, .. } = *format;
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(CaptureError::NotSupported(format!(
            "format {width}x{height} outside 1..={MAX_DIMENSION}"
        )));
    }
    Ok(())
}

fn test_pattern(width: u32, height: u32, sequence: u64) -> Option<Bytes> {
    let total = CapturedFrame::nv12_buffer_size(width, height)?;
    let y_size = width as usize * height as usize;
    let luma = (sequence.wrapping_mul(8) % 256) as u8;

    let mut data = vec![128u8; total];
    data[..y_size].fill(luma);
    Some(Bytes::from(data))
}

/// Largest even-sized region of `width`x`height` with the given ratio.
fn crop_to_aspect(width: u32, height: u32, ratio: f32) -> (u32, u32) {
    if !ratio.is_finite() || ratio <= 0.0 || height == 0 {
        return (width, height);
    }

    let current = width as f32 / height as f32;
    let (w, h) = if ratio < current {
        ((height as f32 * ratio) as u32, height)
    } else {
        (width, (width as f32 / ratio) as u32)
    };
    ((w & !1).max(2), (h & !1).max(2))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossbeam_channel::Sender;
    use vidcap_ipc::VideoRotation;

    use super::*;
    use crate::output::{BackendListener, FrameRoute, FrameSink};

    struct ChannelSink(Sender<CapturedFrame>);

    impl FrameSink for ChannelSink {
        fn on_frame(&self, frame: &CapturedFrame, _rotation: VideoRotation) {
            let _ = self.0.send(frame.clone());
        }
    }

    struct FailureListener(Sender<CaptureError>);

    impl BackendListener for FailureListener {
        fn first_frame(&self, _generation: u64) {}

        fn backend_failed(&self, _generation: u64, error: CaptureError) {
            let _ = self.0.send(error);
        }
    }

    const FORMAT: SourceFormat = SourceFormat {
        width: 16,
        height: 8,
        fps: 200,
    };

    #[test]
    fn test_produces_sequenced_valid_frames() {
        let factory = SyntheticFactory::new(FORMAT);
        let resources = PlatformResources::new(factory.clone());
        let (frame_tx, frame_rx) = crossbeam_channel::unbounded();
        let (fail_tx, _fail_rx) = crossbeam_channel::unbounded();
        let route = Arc::new(FrameRoute::new(
            Arc::new(ChannelSink(frame_tx)),
            VideoRotation::Rotation0,
        ));

        let mut backend = resources
            .create_backend(&CaptureTarget::camera("cam0"))
            .unwrap();
        backend
            .start(FrameOutput::new(1, route, Arc::new(FailureListener(fail_tx))))
            .unwrap();

        for expected in 0..3 {
            let frame = frame_rx.recv_timeout(Duration::from_secs(2)).unwrap();
            assert_eq!(frame.sequence, expected);
            assert!(frame.is_valid());
            assert_eq!(*frame.source, CaptureTarget::camera("cam0"));
        }

        backend.stop().unwrap();
        assert!(!backend.is_active());
        drop(backend);
        assert_eq!(factory.live_backends(), 0);
        assert_eq!(factory.backends_created(), 1);
    }

    #[test]
    fn test_denied_target_fails_to_start() {
        let factory = SyntheticFactory::new(FORMAT);
        factory.deny(CaptureTarget::ScreenRegion);
        let resources = PlatformResources::new(factory);
        let (frame_tx, _frame_rx) = crossbeam_channel::unbounded();
        let (fail_tx, _fail_rx) = crossbeam_channel::unbounded();
        let route = Arc::new(FrameRoute::new(
            Arc::new(ChannelSink(frame_tx)),
            VideoRotation::Rotation0,
        ));

        let mut backend = resources.create_backend(&CaptureTarget::ScreenRegion).unwrap();
        let result = backend.start(FrameOutput::new(1, route, Arc::new(FailureListener(fail_tx))));
        assert_eq!(result.err(), Some(CaptureError::PermissionDenied));
    }

    #[test]
    fn test_empty_camera_id_not_found() {
        let resources = PlatformResources::new(SyntheticFactory::new(FORMAT));
        let result = resources.create_backend(&CaptureTarget::camera(""));
        assert!(matches!(result, Err(CaptureError::SourceNotFound(_))));
    }

    #[test]
    fn test_fail_after_reports_device_lost() {
        let resources = PlatformResources::new(SyntheticFactory::new(FORMAT).fail_after_frames(2));
        let (frame_tx, frame_rx) = crossbeam_channel::unbounded();
        let (fail_tx, fail_rx) = crossbeam_channel::unbounded();
        let route = Arc::new(FrameRoute::new(
            Arc::new(ChannelSink(frame_tx)),
            VideoRotation::Rotation0,
        ));

        let mut backend = resources.create_backend(&CaptureTarget::camera("cam0")).unwrap();
        backend
            .start(FrameOutput::new(1, route, Arc::new(FailureListener(fail_tx))))
            .unwrap();

        let error = fail_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(error, CaptureError::DeviceLost);
        backend.stop().unwrap();
        assert_eq!(frame_rx.try_iter().count(), 2);
    }

    #[test]
    fn test_unusable_format_rejected() {
        for (width, height) in [(0, 720), (1280, 0), (70_000, 70_000)] {
            let factory = SyntheticFactory::new(SourceFormat {
                width,
                height,
                fps: 30,
            });
            let resources = PlatformResources::new(factory.clone());
            let result = resources.create_backend(&CaptureTarget::camera("cam0"));
            assert!(matches!(result, Err(CaptureError::NotSupported(_))));
            assert_eq!(factory.live_backends(), 0);
        }
    }

    #[test]
    fn test_panicking_sink_fails_output() {
        struct PanicSink;

        impl FrameSink for PanicSink {
            fn on_frame(&self, _frame: &CapturedFrame, _rotation: VideoRotation) {
                panic!("sink exploded");
            }
        }

        let resources = PlatformResources::new(SyntheticFactory::new(FORMAT));
        let (fail_tx, fail_rx) = crossbeam_channel::unbounded();
        let route = Arc::new(FrameRoute::new(Arc::new(PanicSink), VideoRotation::Rotation0));

        let mut backend = resources.create_backend(&CaptureTarget::camera("cam0")).unwrap();
        backend
            .start(FrameOutput::new(1, route, Arc::new(FailureListener(fail_tx))))
            .unwrap();

        let error = fail_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(error, CaptureError::Platform { .. }));
        assert!(backend.stop().is_ok());
    }

    #[test]
    fn test_crop_to_aspect() {
        assert_eq!(crop_to_aspect(1280, 720, 1.0), (720, 720));
        assert_eq!(crop_to_aspect(1280, 720, 4.0), (1280, 320));
        assert_eq!(crop_to_aspect(1280, 720, f32::NAN), (1280, 720));
    }
}
