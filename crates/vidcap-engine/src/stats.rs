//! Capture statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use vidcap_capture::FrameRoute;
use vidcap_ipc::CaptureStats;

/// Counts backend lifecycle events for one capture interface.
///
/// Frame counters live on the [`FrameRoute`], which sees every frame; this
/// collector tracks what the binding does with backends.
#[derive(Debug, Default)]
pub struct StatsCollector {
    backends_created: AtomicU64,
    target_switches: AtomicU64,
    failures: AtomicU64,
}

impl StatsCollector {
    /// Record a backend being constructed.
    pub fn record_backend_created(&self) {
        self.backends_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed target switch.
    pub fn record_target_switch(&self) {
        self.target_switches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a backend open or mid-session failure.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot combining lifecycle and frame counters.
    pub fn snapshot(&self, route: &FrameRoute) -> CaptureStats {
        CaptureStats {
            frames_delivered: route.frames_delivered(),
            frames_dropped_paused: route.frames_dropped_paused(),
            backends_created: self.backends_created.load(Ordering::Relaxed),
            target_switches: self.target_switches.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}
