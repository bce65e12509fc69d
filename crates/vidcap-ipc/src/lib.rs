//! Typed control messages for the video capture interface.
//!
//! This crate defines the commands a façade posts to its capture context,
//! the events it reports back, and the state machine both sides agree on.

mod commands;
mod events;
mod state;
mod types;

pub use commands::CaptureCommand;
pub use events::CaptureEvent;
pub use state::CaptureState;
pub use types::{
    CaptureOptions, CaptureStats, CaptureTarget, ErrorKind, SourceFormat, VideoRotation,
};

use crossbeam_channel::{Receiver, Sender};

/// Default channel capacity for events (capture context → owner).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates a bounded event channel.
pub fn event_channel(capacity: usize) -> (Sender<CaptureEvent>, Receiver<CaptureEvent>) {
    crossbeam_channel::bounded(capacity.max(1))
}
