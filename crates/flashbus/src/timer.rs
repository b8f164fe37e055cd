//! One-shot timers backing message self-destruction.
//!
//! The host environment owns the task queue; a [`Scheduler`] is the seam
//! through which messages ask it to run something later. [`TokioScheduler`]
//! is the default and runs each timer as a spawned task.

use std::time::Duration;

use tokio::runtime::Handle;

use crate::error::{Error, Result};

/// Deferred work handed to a scheduler.
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Schedules one-shot callbacks.
pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay`, unless the returned handle is cancelled first.
    fn schedule(&self, delay: Duration, task: TimerTask) -> Result<TimerHandle>;
}

/// Cancellation handle of a pending timer.
///
/// Dropping the handle leaves the timer running; only [`TimerHandle::cancel`]
/// disarms it.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl TimerHandle {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Handle with nothing to cancel.
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

/// Scheduler running timers on a tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct TokioScheduler {
    /// Explicit runtime; falls back to the ambient one when unset
    handle: Option<Handle>,
}

impl TokioScheduler {
    /// Create a scheduler bound to whichever runtime is current when a timer is armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scheduler bound to a specific runtime.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn runtime(&self) -> Result<Handle> {
        match &self.handle {
            Some(handle) => Ok(handle.clone()),
            None => Handle::try_current().map_err(|_| Error::NoRuntime),
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: TimerTask) -> Result<TimerHandle> {
        let runtime = self.runtime()?;
        let join = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
        Ok(TimerHandle::new(move || join.abort()))
    }
}
