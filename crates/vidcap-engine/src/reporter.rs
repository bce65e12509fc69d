//! Publishing of state and events from the capture context.

use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};
use parking_lot::RwLock;
use tracing::{debug, warn};
use vidcap_ipc::{CaptureEvent, CaptureState, CaptureTarget};

use crate::context::ExecutionContext;
use crate::stats::StatsCollector;

/// Callback invoked on the control context for every event.
pub type EventHandler = Arc<dyn Fn(&CaptureEvent) + Send + Sync>;

/// State mirrored out of the capture context for the owner to read.
///
/// Only the binding writes here, and only from the capture context.
pub struct Reporter {
    state: RwLock<CaptureState>,
    target: RwLock<CaptureTarget>,
    event_tx: Sender<CaptureEvent>,
    handler: RwLock<Option<EventHandler>>,
    control: Arc<dyn ExecutionContext>,
    stats: StatsCollector,
}

impl Reporter {
    /// Create a reporter publishing to `event_tx`.
    pub fn new(
        target: CaptureTarget,
        event_tx: Sender<CaptureEvent>,
        control: Arc<dyn ExecutionContext>,
    ) -> Self {
        Self {
            state: RwLock::new(CaptureState::Created),
            target: RwLock::new(target),
            event_tx,
            handler: RwLock::new(None),
            control,
            stats: StatsCollector::default(),
        }
    }

    /// Last state committed on the capture context.
    pub fn state(&self) -> CaptureState {
        *self.state.read()
    }

    /// Current capture target.
    pub fn target(&self) -> CaptureTarget {
        self.target.read().clone()
    }

    /// Lifecycle counters.
    pub fn stats(&self) -> &StatsCollector {
        &self.stats
    }

    /// Install or clear the event handler.
    pub fn set_handler(&self, handler: Option<EventHandler>) {
        *self.handler.write() = handler;
    }

    pub(crate) fn publish_state(&self, state: CaptureState) {
        *self.state.write() = state;
    }

    pub(crate) fn publish_target(&self, target: CaptureTarget) {
        *self.target.write() = target;
    }

    /// Send an event to the channel and, if installed, the handler.
    pub(crate) fn send(&self, event: CaptureEvent) {
        let handler = self.handler.read().clone();
        if let Some(handler) = handler {
            let event = event.clone();
            if let Err(e) = self.control.post(Box::new(move || handler(&event))) {
                debug!("Dropping event for handler: {}", e);
            }
        }

        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                debug!(?event, "Event channel full, dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("Event channel disconnected");
            }
        }
    }
}
