//! Delayed-callback scheduling for the double-tap grace window
//!
//! The replay timer fires on a different execution context than the
//! capture thread. Cancellation is synchronous; whatever still slips
//! through is caught by the engine's epoch check.

use std::fmt;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Work run when a timer expires
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Something that can stop a scheduled task from running
pub trait Cancel: Send + Sync {
    fn cancel(&self);
}

/// Handle to a scheduled task; cancelling is idempotent
pub struct TimerHandle {
    inner: Box<dyn Cancel>,
}

impl TimerHandle {
    pub fn new(inner: impl Cancel + 'static) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle").finish_non_exhaustive()
    }
}

/// Runs a task once after a delay
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle;
}

/// Scheduler backed by a tokio runtime.
///
/// Holds a runtime [`Handle`] so it can be called from the capture thread,
/// which is not a tokio worker.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime of the calling task.
    ///
    /// Returns `None` outside of a tokio runtime.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Cancel for JoinHandle<()> {
    fn cancel(&self) {
        self.abort();
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
        TimerHandle::new(join)
    }
}
