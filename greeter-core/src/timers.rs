// ABOUTME: Debounced notifications and the auto-clearing welcome cooldown flag
// ABOUTME: Both keep at most one pending timer; arming again replaces the previous one

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Runs a callback after a quiet period.
///
/// Scheduling while a callback is still pending cancels the pending one, so a
/// burst of calls produces a single callback `delay` after the last of them.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `callback`, replacing any callback still waiting to fire
    pub fn schedule(&self, callback: impl FnOnce() + Send + 'static) {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(previous) = pending.replace(handle) {
                previous.abort();
            }
        }
    }

    /// Drop the pending callback without running it
    pub fn cancel(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(previous) = pending.take() {
                previous.abort();
            }
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A flag that switches itself off after a timeout.
///
/// Exactly one expiry timer exists while the flag is set; `arm` and `clear`
/// abort the previous timer so a stale expiry can never cut a newer window short.
#[derive(Default)]
pub struct Cooldown {
    active: Arc<AtomicBool>,
    expiry: Option<JoinHandle<()>>,
}

impl Cooldown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Set the flag and schedule it to clear after `window`
    pub fn arm(&mut self, window: Duration) {
        if let Some(previous) = self.expiry.take() {
            previous.abort();
        }
        self.active.store(true, Ordering::SeqCst);
        let active = Arc::clone(&self.active);
        self.expiry = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            active.store(false, Ordering::SeqCst);
            tracing::debug!("Welcome cooldown expired");
        }));
    }

    /// Clear the flag immediately and cancel the pending expiry
    pub fn clear(&mut self) {
        if let Some(previous) = self.expiry.take() {
            previous.abort();
        }
        self.active.store(false, Ordering::SeqCst);
    }
}

impl Drop for Cooldown {
    fn drop(&mut self) {
        if let Some(previous) = self.expiry.take() {
            previous.abort();
        }
    }
}
