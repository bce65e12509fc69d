//! Serialized execution contexts.
//!
//! An execution context runs posted tasks one at a time, in the order they
//! were posted. Objects confined to a context are only touched from tasks
//! running on it, which replaces locking across threads with message passing.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::Sender;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::error::{VideoCaptureError, VideoCaptureResult};

/// A unit of work posted to a context.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A named, serialized scheduling domain.
pub trait ExecutionContext: Send + Sync {
    /// Context name, used in logs and errors.
    fn name(&self) -> &str;

    /// Queue `task` to run after every task posted before it.
    fn post(&self, task: Task) -> VideoCaptureResult<()>;

    /// Returns true when called from a task running on this context.
    fn is_current(&self) -> bool;
}

/// The set of contexts a capture interface schedules onto.
pub trait Threads: Send + Sync {
    /// Context that owns the capture source binding and its backend.
    fn capture_context(&self) -> Arc<dyn ExecutionContext>;

    /// Context on which owner callbacks are invoked.
    fn control_context(&self) -> Arc<dyn ExecutionContext>;
}

/// An execution context backed by one dedicated thread.
pub struct SerialContext {
    name: String,
    task_tx: RwLock<Option<Sender<Task>>>,
    thread_id: ThreadId,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SerialContext {
    /// Spawn the context thread.
    pub fn spawn(name: impl Into<String>) -> VideoCaptureResult<Arc<Self>> {
        let name = name.into();
        let (task_tx, task_rx) = crossbeam_channel::unbounded::<Task>();

        let thread_name = name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                debug!(context = %thread_name, "Context thread starting");
                for task in task_rx {
                    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                        error!(context = %thread_name, "Task panicked");
                    }
                }
                debug!(context = %thread_name, "Context thread stopped");
            })
            .map_err(|e| {
                VideoCaptureError::ContextClosed(format!("{name}: failed to spawn thread: {e}"))
            })?;

        info!(context = %name, "Execution context started");

        Ok(Arc::new(Self {
            thread_id: handle.thread().id(),
            name,
            task_tx: RwLock::new(Some(task_tx)),
            worker: Mutex::new(Some(handle)),
        }))
    }

    /// Stop accepting tasks, run the ones already queued, and join the thread.
    ///
    /// When called from the context itself the thread is detached instead.
    pub fn shutdown(&self) {
        if self.task_tx.write().take().is_none() {
            return;
        }

        info!(context = %self.name, "Shutting down execution context");
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if self.is_current() {
                return;
            }
            let _ = handle.join();
        }
    }
}

impl ExecutionContext for SerialContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn post(&self, task: Task) -> VideoCaptureResult<()> {
        let closed = || VideoCaptureError::ContextClosed(self.name.clone());
        self.task_tx
            .read()
            .as_ref()
            .ok_or_else(closed)?
            .send(task)
            .map_err(|_| closed())
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl Drop for SerialContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Thread-backed [`Threads`] implementation.
pub struct ContextSet {
    capture: Arc<SerialContext>,
    control: Arc<SerialContext>,
}

impl ContextSet {
    /// Spawn a capture context and a control context.
    pub fn spawn() -> VideoCaptureResult<Arc<Self>> {
        Ok(Arc::new(Self {
            capture: SerialContext::spawn("vidcap-capture")?,
            control: SerialContext::spawn("vidcap-control")?,
        }))
    }

    /// Shut down both contexts.
    pub fn shutdown(&self) {
        self.capture.shutdown();
        self.control.shutdown();
    }
}

impl Threads for ContextSet {
    fn capture_context(&self) -> Arc<dyn ExecutionContext> {
        self.capture.clone()
    }

    fn control_context(&self) -> Arc<dyn ExecutionContext> {
        self.control.clone()
    }
}
