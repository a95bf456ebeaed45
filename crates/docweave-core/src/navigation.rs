//! Save-before-navigate interception.
//!
//! Every outgoing navigation is classified once into a
//! [`NavigationDecision`]. Navigations that cannot lose edits are left
//! alone; the rest are held while the coordinator flushes, then handed to
//! the [`NavigationController`]. If the flush never confirms, the
//! navigation is never resumed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};
use url::Url;

use crate::capability::{Host, NavigationController};
use crate::coordinator::SaveCoordinator;
use crate::error::DocweaveError;

/// An attempted navigation, as reported by the hosting environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigateEvent {
    pub destination: Url,
    /// Same-document fragment change.
    pub hash_change: bool,
    /// Suggested filename when the navigation is a download.
    pub download_request: Option<String>,
    /// The navigation submits a form.
    pub form_data: bool,
    /// The environment lets us hold this navigation.
    pub can_intercept: bool,
}

impl NavigateEvent {
    /// A plain, interceptable link navigation.
    pub fn link(destination: Url) -> Self {
        Self {
            destination,
            hash_change: false,
            download_request: None,
            form_data: false,
            can_intercept: true,
        }
    }
}

/// Why a navigation was let through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    HashChange,
    Download,
    FormSubmission,
    NotInterceptable,
    /// An external controller already approved this navigation.
    Sanctioned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    Ignore(IgnoreReason),
    InterceptAndSave,
}

#[derive(Debug)]
pub enum NavigationOutcome {
    /// Let through without saving.
    Ignored(IgnoreReason),
    /// Saved (if dirty), detached, and the destination was signalled.
    Resumed(Url),
    /// Another intercepted navigation is still waiting on its save.
    Rejected,
    /// The save failed; the navigation stays blocked.
    Blocked(DocweaveError),
    /// The interceptor already detached itself and no longer listens.
    Detached,
}

/// One-shot approval flag owned by an external controller.
///
/// The interceptor only reads it. It is cleared by the page reload that the
/// approved navigation causes, i.e. by dropping the session.
#[derive(Debug, Clone, Default)]
pub struct NavigationAllowance(Arc<AtomicBool>);

impl NavigationAllowance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_next(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_allowed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Clears the pending flag when the held navigation ends, including when its
/// future is dropped.
struct PendingGuard<'a>(&'a AtomicBool);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Holds navigations until the document is flushed.
pub struct NavigationInterceptor<H, N> {
    coordinator: SaveCoordinator<H>,
    controller: N,
    allowance: NavigationAllowance,
    listening: AtomicBool,
    pending: AtomicBool,
}

impl<H: Host, N: NavigationController> NavigationInterceptor<H, N> {
    pub fn new(
        coordinator: SaveCoordinator<H>,
        controller: N,
        allowance: NavigationAllowance,
    ) -> Self {
        Self {
            coordinator,
            controller,
            allowance,
            listening: AtomicBool::new(true),
            pending: AtomicBool::new(false),
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Classify a navigation. Pure apart from reading the allowance.
    pub fn decide(&self, event: &NavigateEvent) -> NavigationDecision {
        use IgnoreReason::*;
        let reason = if event.hash_change {
            Some(HashChange)
        } else if event.download_request.is_some() {
            Some(Download)
        } else if event.form_data {
            Some(FormSubmission)
        } else if !event.can_intercept {
            Some(NotInterceptable)
        } else if self.allowance.is_allowed() {
            Some(Sanctioned)
        } else {
            None
        };
        match reason {
            Some(reason) => NavigationDecision::Ignore(reason),
            None => NavigationDecision::InterceptAndSave,
        }
    }

    /// Handle one navigation attempt.
    ///
    /// The caller must hold the browser's default transition for as long as
    /// this future is pending; it resolves only after the save finished.
    pub async fn handle(&self, event: NavigateEvent) -> NavigationOutcome {
        if !self.is_listening() {
            return NavigationOutcome::Detached;
        }
        match self.decide(&event) {
            NavigationDecision::Ignore(reason) => {
                debug!(?reason, destination = %event.destination, "navigation ignored");
                return NavigationOutcome::Ignored(reason);
            }
            NavigationDecision::InterceptAndSave => {}
        }
        if self.pending.swap(true, Ordering::AcqRel) {
            debug!(
                destination = %event.destination,
                "navigation rejected, another one is pending"
            );
            return NavigationOutcome::Rejected;
        }

        let pending = PendingGuard(&self.pending);
        let result = self.coordinator.save(false).await;
        drop(pending);
        match result {
            Ok(_) => {
                self.listening.store(false, Ordering::Release);
                info!(destination = %event.destination, "document flushed, resuming navigation");
                self.controller.navigate(&event.destination);
                NavigationOutcome::Resumed(event.destination)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    destination = %event.destination,
                    "navigation blocked by failed save"
                );
                NavigationOutcome::Blocked(e)
            }
        }
    }
}
