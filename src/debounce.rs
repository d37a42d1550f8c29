//! A cancellable, reschedulable delayed task.
//!
//! Each [`Debouncer::schedule`] aborts whatever was pending and starts a new
//! timer, so a burst of calls runs only the last task, once the burst has
//! been quiet for the full delay. Used for credential persistence while the
//! user types.

use std::time::Duration;
use tokio::task::JoinHandle;

/// Owner of at most one pending delayed task.
///
/// Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Cancel the pending task (if any) and run `task` after the delay.
    pub fn schedule<F>(&mut self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        }));
    }

    /// Abort the pending task. Returns whether one was still waiting.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) => {
                let waiting = !handle.is_finished();
                handle.abort();
                waiting
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for the pending task to run to completion.
    pub async fn settle(&mut self) {
        if let Some(handle) = self.pending.take() {
            // A cancelled or panicked task has nothing left to wait for.
            let _ = handle.await;
        }
    }
}
