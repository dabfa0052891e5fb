//! Latest-wins debounced trigger.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Coalesces bursts of trigger calls into a single invocation.
///
/// Each call schedules its request after a quiet period of `wait`; a call
/// arriving inside the window aborts the previously scheduled request and
/// restarts the timer, so only the last request of a burst ever runs.
/// Fire-and-forget: nothing is returned to the caller. Dropping the
/// debouncer aborts any pending request, so nothing fires after teardown.
pub struct Debouncer {
    wait: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            pending: Mutex::new(None),
        }
    }

    /// Schedules `request` to run after the quiet period, dropping any
    /// previously scheduled request without running it.
    pub fn trigger<F, Fut>(&self, request: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let wait = self.wait;
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(previous) = pending.take() {
                previous.abort();
            }
            *pending = Some(tokio::spawn(async move {
                tokio::time::sleep(wait).await;
                request().await;
            }));
        }
    }

    /// Drops any pending request without running it.
    pub fn cancel(&self) {
        if let Ok(mut pending) = self.pending.lock()
            && let Some(previous) = pending.take()
        {
            previous.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
