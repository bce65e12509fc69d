//! Captured frame types.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use vidcap_ipc::CaptureTarget;

/// Timestamp for a captured frame.
#[derive(Debug, Clone, Copy)]
pub struct CaptureTimestamp {
    /// Monotonic timestamp when the frame was captured.
    pub capture_time: Instant,

    /// Frame presentation timestamp in 100ns units, relative to backend start.
    pub pts_100ns: u64,
}

impl CaptureTimestamp {
    /// Create a new capture timestamp.
    pub fn now(start_time: Instant) -> Self {
        let capture_time = Instant::now();
        let elapsed = capture_time.duration_since(start_time);
        let pts_100ns = elapsed.as_nanos() as u64 / 100;

        Self {
            capture_time,
            pts_100ns,
        }
    }

    /// Get the presentation timestamp in milliseconds.
    pub fn pts_ms(&self) -> u64 {
        self.pts_100ns / 10_000
    }
}

/// A captured video frame.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// NV12 pixel data.
    pub data: Bytes,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Capture timestamp.
    pub timestamp: CaptureTimestamp,

    /// Monotonically increasing sequence number, per backend.
    pub sequence: u64,

    /// Target of the backend that produced this frame.
    pub source: Arc<CaptureTarget>,
}

impl CapturedFrame {
    /// Create a new captured frame.
    pub fn new(
        data: Bytes,
        width: u32,
        height: u32,
        timestamp: CaptureTimestamp,
        sequence: u64,
        source: Arc<CaptureTarget>,
    ) -> Self {
        Self {
            data,
            width,
            height,
            timestamp,
            sequence,
            source,
        }
    }

    /// Calculate expected NV12 buffer size for given dimensions.
    ///
    /// Returns `None` when the size does not fit in `usize`.
    pub fn nv12_buffer_size(width: u32, height: u32) -> Option<usize> {
        // NV12: Y plane (width * height) + UV plane (width * height / 2)
        let y_size = usize::try_from(u64::from(width) * u64::from(height)).ok()?;
        y_size.checked_add(y_size / 2)
    }

    /// Validate that the frame data matches expected dimensions.
    pub fn is_valid(&self) -> bool {
        Self::nv12_buffer_size(self.width, self.height) == Some(self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nv12_buffer_size() {
        assert_eq!(CapturedFrame::nv12_buffer_size(4, 2), Some(12));
        assert_eq!(CapturedFrame::nv12_buffer_size(1280, 720), Some(1_382_400));
        assert_eq!(CapturedFrame::nv12_buffer_size(0, 720), Some(0));
    }

    #[test]
    fn test_frame_validity() {
        let start = Instant::now();
        let source = Arc::new(CaptureTarget::ScreenRegion);
        let good = CapturedFrame::new(
            Bytes::from(vec![0u8; 12]),
            4,
            2,
            CaptureTimestamp::now(start),
            0,
            source.clone(),
        );
        assert!(good.is_valid());

        let short = CapturedFrame::new(
            Bytes::from(vec![0u8; 8]),
            4,
            2,
            CaptureTimestamp::now(start),
            1,
            source,
        );
        assert!(!short.is_valid());
    }
}
