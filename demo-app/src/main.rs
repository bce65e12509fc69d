//! Scripted demo for the video capture interface.
//!
//! Starts a synthetic camera, rotates the output, switches to the screen,
//! pauses and resumes, then stops and prints the capture statistics.
//! Pass a JSON config path as the first argument to override defaults.

mod config;
mod sink;

use std::sync::Arc;
use std::thread;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidcap_capture::{FrameSink, PlatformResources, SyntheticFactory};
use vidcap_engine::{ContextSet, VideoCaptureInterface};
use vidcap_ipc::{CaptureEvent, CaptureTarget, VideoRotation};

use crate::config::DemoConfig;
use crate::sink::LoggingSink;

/// Initialize logging.
fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "vidcap_demo=debug,vidcap_engine=debug,vidcap_capture=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn log_event(event: &CaptureEvent) {
    match serde_json::to_string(event) {
        Ok(json) => info!(event = %json, "Capture event"),
        Err(e) => warn!("Failed to serialize event: {}", e),
    }
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let config = match std::env::args().nth(1) {
        Some(path) => DemoConfig::load(path)?,
        None => DemoConfig::default(),
    };
    info!(?config, "Starting capture demo");

    let threads = ContextSet::spawn()?;
    let resources = Arc::new(PlatformResources::new(SyntheticFactory::new(config.format)));
    let sink = Arc::new(LoggingSink::default());
    let output: Arc<dyn FrameSink> = sink.clone();

    let capture = VideoCaptureInterface::create_with_options(
        threads.clone(),
        Some(output),
        CaptureTarget::camera(config.camera_id.clone()),
        resources,
        config.options.clone(),
    )?;
    capture.set_event_handler(log_event);

    let step = config.step();

    capture.start()?;
    thread::sleep(step);

    capture.set_output_rotation(VideoRotation::Rotation90)?;
    capture.switch_target(CaptureTarget::ScreenRegion)?;
    thread::sleep(step);

    capture.pause()?;
    thread::sleep(step);

    capture.resume()?;
    thread::sleep(step);

    capture.stop()?;
    capture.wait_idle()?;

    let errors: Vec<CaptureEvent> = capture
        .events()
        .try_iter()
        .filter(|event| event.error_kind().is_some())
        .collect();
    for error in &errors {
        warn!(?error, "Capture reported an error");
    }
    if capture.state().is_failed() {
        warn!(capture = %capture.target(), "Capture ended in the failed state");
    }

    let stats = capture.stats();
    drop(capture);
    threads.shutdown();

    println!("{}", serde_json::to_string_pretty(&stats)?);
    println!("{}", serde_json::to_string_pretty(&sink.counts())?);
    info!(final_errors = errors.len(), "Capture demo finished");
    Ok(())
}
