//! Objects confined to one execution context.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::context::ExecutionContext;
use crate::error::VideoCaptureResult;

type Cell<T> = Mutex<Option<T>>;

/// Owns a value that is constructed, used and destroyed on one context.
///
/// Every access is posted as a task, so callers on other threads never
/// block on the value. Dropping the owner destroys the value on its context
/// and waits for that to finish.
pub struct ContextBound<T: Send + 'static> {
    context: Arc<dyn ExecutionContext>,
    cell: Arc<Cell<T>>,
}

/// Non-owning handle to a [`ContextBound`] value.
///
/// Tasks posted through it are skipped once the value has been destroyed.
pub struct WeakBound<T: Send + 'static> {
    context: Arc<dyn ExecutionContext>,
    cell: Weak<Cell<T>>,
}

impl<T: Send + 'static> ContextBound<T> {
    /// Construct the value on `context` with `init`.
    ///
    /// `init` receives a weak handle the value may keep for posting work to
    /// itself, for example from callbacks raised on other threads.
    pub fn new(
        context: Arc<dyn ExecutionContext>,
        init: impl FnOnce(WeakBound<T>) -> T + Send + 'static,
    ) -> VideoCaptureResult<Self> {
        let cell: Arc<Cell<T>> = Arc::new(Mutex::new(None));
        let weak = WeakBound {
            context: Arc::clone(&context),
            cell: Arc::downgrade(&cell),
        };

        let target = Arc::clone(&cell);
        context.post(Box::new(move || {
            let value = init(weak);
            *target.lock() = Some(value);
        }))?;

        Ok(Self { context, cell })
    }

    /// The context the value lives on.
    pub fn context(&self) -> &Arc<dyn ExecutionContext> {
        &self.context
    }

    /// Run `f` against the value on its context.
    pub fn perform(&self, f: impl FnOnce(&mut T) + Send + 'static) -> VideoCaptureResult<()> {
        let cell = Arc::clone(&self.cell);
        self.context.post(Box::new(move || run_on(&cell, f)))
    }

    /// Weak handle to the value.
    pub fn downgrade(&self) -> WeakBound<T> {
        WeakBound {
            context: Arc::clone(&self.context),
            cell: Arc::downgrade(&self.cell),
        }
    }

    fn destroy(&self) {
        let release = |cell: &Cell<T>| {
            let value = cell.lock().take();
            drop(value);
        };

        if self.context.is_current() {
            release(&self.cell);
            return;
        }

        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        let cell = Arc::clone(&self.cell);
        let posted = self.context.post(Box::new(move || {
            release(&cell);
            let _ = done_tx.send(());
        }));

        let completed = posted.is_ok() && done_rx.recv().is_ok();
        if !completed {
            warn!(
                context = %self.context.name(),
                "Context unavailable, destroying bound value inline"
            );
            release(&self.cell);
        }
    }
}

impl<T: Send + 'static> Drop for ContextBound<T> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<T: Send + 'static> WeakBound<T> {
    /// Run `f` against the value on its context, if it still exists.
    pub fn perform(&self, f: impl FnOnce(&mut T) + Send + 'static) -> VideoCaptureResult<()> {
        let cell = self.cell.clone();
        self.context.post(Box::new(move || {
            if let Some(cell) = cell.upgrade() {
                run_on(&cell, f);
            }
        }))
    }
}

impl<T: Send + 'static> Clone for WeakBound<T> {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            cell: self.cell.clone(),
        }
    }
}

fn run_on<T>(cell: &Cell<T>, f: impl FnOnce(&mut T)) {
    match cell.lock().as_mut() {
        Some(value) => f(value),
        None => debug!("Bound value already destroyed, skipping task"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossbeam_channel::Sender;

    use super::*;
    use crate::context::SerialContext;

    struct Probe {
        context: Arc<SerialContext>,
        events: Sender<(&'static str, bool)>,
    }

    impl Drop for Probe {
        fn drop(&mut self) {
            let _ = self.events.send(("drop", self.context.is_current()));
        }
    }

    #[test]
    fn test_value_lives_on_its_context() {
        let context = SerialContext::spawn("test-bound").unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();

        let probe_context = Arc::clone(&context);
        let bound = ContextBound::new(context.clone(), move |_weak| {
            let _ = tx.send(("init", probe_context.is_current()));
            Probe {
                context: probe_context,
                events: tx,
            }
        })
        .unwrap();

        bound
            .perform(|probe| {
                let _ = probe.events.send(("perform", probe.context.is_current()));
            })
            .unwrap();

        drop(bound);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![("init", true), ("perform", true), ("drop", true)]
        );
    }

    #[test]
    fn test_weak_handle_skips_after_destroy() {
        let context = SerialContext::spawn("test-weak").unwrap();
        let bound = ContextBound::new(context.clone(), |_weak| 0u32).unwrap();
        let weak = bound.downgrade();

        weak.perform(|value| *value += 1).unwrap();
        drop(bound);

        let (tx, rx) = crossbeam_channel::bounded(1);
        weak.perform(move |_| {
            let _ = tx.send(());
        })
        .unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_destroy_inline_when_context_closed() {
        let context = SerialContext::spawn("test-inline").unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();

        let probe_context = Arc::clone(&context);
        let bound = ContextBound::new(context.clone(), move |_weak| Probe {
            context: probe_context,
            events: tx,
        })
        .unwrap();

        context.shutdown();
        drop(bound);

        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![("drop", false)]);
    }
}
