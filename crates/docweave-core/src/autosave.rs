//! Debounced autosave.
//!
//! Each mutation restarts a quiet-period timer; only the last mutation in a
//! burst leads to a save. When the timer fires the save is started on its own
//! task, so cancelling a later timer never cancels a save that already began.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use n0_future::task::{self, JoinHandle};
use n0_future::time::{self, Duration};
use tracing::{debug, warn};

use crate::capability::Host;
use crate::coordinator::SaveCoordinator;

struct Inner {
    quiet_period: Duration,
    enabled: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// Owns the single autosave timer of a session.
pub struct AutosaveScheduler<H> {
    coordinator: SaveCoordinator<H>,
    inner: Arc<Inner>,
}

impl<H> Clone for AutosaveScheduler<H> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<H: Host> AutosaveScheduler<H> {
    pub fn new(coordinator: SaveCoordinator<H>, quiet_period: Duration) -> Self {
        Self {
            coordinator,
            inner: Arc::new(Inner {
                quiet_period,
                enabled: AtomicBool::new(true),
                timer: Mutex::new(None),
            }),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.inner.quiet_period
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    /// Whether a timer is armed and has not fired yet.
    pub fn is_pending(&self) -> bool {
        self.timer()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Restart the quiet period. Must be called from within the async runtime.
    pub fn notify_mutation(&self) {
        if !self.is_enabled() {
            return;
        }
        let coordinator = self.coordinator.clone();
        // The quiet period runs from the mutation, not from the first poll.
        let deadline = time::Instant::now() + self.inner.quiet_period;
        let mut timer = self.timer();
        if let Some(previous) = timer.take() {
            previous.abort();
        }
        *timer = Some(task::spawn(async move {
            time::sleep_until(deadline).await;
            debug!("quiet period elapsed, autosaving");
            task::spawn(async move {
                if let Err(e) = coordinator.save(false).await {
                    warn!(error = %e, "autosave failed, document stays dirty");
                }
            });
        }));
    }

    /// Disable autosave while content is replaced programmatically.
    ///
    /// Also cancels an armed timer.
    pub fn suspend(&self) {
        self.inner.enabled.store(false, Ordering::Release);
        self.cancel();
    }

    /// Re-enable autosave. Does not arm a timer by itself.
    pub fn resume(&self) {
        self.inner.enabled.store(true, Ordering::Release);
    }

    /// Cancel the armed timer, if any. A cancelled timer never fires.
    pub fn cancel(&self) {
        if let Some(previous) = self.timer().take() {
            previous.abort();
        }
    }

    fn timer(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner.timer.lock().unwrap_or_else(|e| e.into_inner())
    }
}
