//! A frame sink that counts and logs what it receives.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;
use vidcap_capture::{CapturedFrame, FrameSink};
use vidcap_ipc::VideoRotation;

/// Counts frames per capture target.
#[derive(Default)]
pub struct LoggingSink {
    counts: Mutex<HashMap<String, u64>>,
}

impl LoggingSink {
    /// Frames received so far, per target.
    pub fn counts(&self) -> HashMap<String, u64> {
        self.counts.lock().clone()
    }
}

impl FrameSink for LoggingSink {
    fn on_frame(&self, frame: &CapturedFrame, rotation: VideoRotation) {
        let mut counts = self.counts.lock();
        let count = counts.entry(frame.source.to_string()).or_default();
        *count += 1;

        if *count == 1 || *count % 30 == 0 {
            debug!(
                source = %frame.source,
                sequence = frame.sequence,
                pts_ms = frame.timestamp.pts_ms(),
                width = frame.width,
                height = frame.height,
                rotation = rotation.degrees(),
                "Frame received"
            );
        }
    }
}
