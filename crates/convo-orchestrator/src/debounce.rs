//! Per-key cancel-and-reset debounce scheduling.
//!
//! Scheduling state lives in this owned struct, injected into the
//! orchestrators, rather than in module-global timer maps. Triggering a
//! key that already has a pending timer aborts it and starts the delay
//! over; distinct keys never interact. Only the pending delay is ever
//! cancelled; work that has started runs to completion.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

/// Owned map of key -> pending debounce timer.
pub struct DebounceScheduler {
    delay: Duration,
    pending: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl DebounceScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Schedule `work` to run after the debounce delay, cancelling and
    /// resetting any pending timer for the same key.
    pub fn trigger<F>(&self, key: &str, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            work.await;
        });

        let mut pending = self.pending.lock().expect("timer map mutex poisoned");
        // Completed timers are dead weight; drop them while we hold the lock
        pending.retain(|_, h| !h.is_finished());
        if let Some(previous) = pending.insert(key.to_string(), handle) {
            previous.abort();
            debug!(key = %key, "debounce timer reset");
        }
    }

    /// Cancel any pending timer for a key. Work already past its delay
    /// is not interrupted.
    pub fn cancel(&self, key: &str) {
        if let Some(handle) = self.pending.lock().expect("timer map mutex poisoned").remove(key) {
            handle.abort();
            debug!(key = %key, "debounce timer cancelled");
        }
    }

    /// Whether a timer (or its work) is still in flight for this key.
    pub fn is_pending(&self, key: &str) -> bool {
        self.pending
            .lock()
            .expect("timer map mutex poisoned")
            .get(key)
            .is_some_and(|h| !h.is_finished())
    }

    /// Number of keys with live timers.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .expect("timer map mutex poisoned")
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.pending.lock().expect("timer map mutex poisoned").len()
    }
}
