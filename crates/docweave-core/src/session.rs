//! One open document: coordinator, autosave timer and navigation guard wired
//! to the same state.

use tokio::sync::watch;

use crate::autosave::AutosaveScheduler;
use crate::capability::{Host, NavigationController};
use crate::config::SessionConfig;
use crate::coordinator::{SaveCoordinator, SaveOutcome, SaveStatus};
use crate::error::Result;
use crate::navigation::{NavigationAllowance, NavigationInterceptor};
use crate::types::{DocumentSnapshot, Metadata};

/// Editing session for a single document.
///
/// Independent sessions share nothing, so several can be open at once.
pub struct Session<H> {
    coordinator: SaveCoordinator<H>,
    autosave: AutosaveScheduler<H>,
}

impl<H> Clone for Session<H> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            autosave: self.autosave.clone(),
        }
    }
}

impl<H: Host> Session<H> {
    pub fn new(host: H, config: SessionConfig) -> Self {
        let quiet_period = config.quiet_period();
        let coordinator = SaveCoordinator::new(host, config);
        let autosave = AutosaveScheduler::new(coordinator.clone(), quiet_period);
        Self {
            coordinator,
            autosave,
        }
    }

    pub fn coordinator(&self) -> &SaveCoordinator<H> {
        &self.coordinator
    }

    pub fn autosave(&self) -> &AutosaveScheduler<H> {
        &self.autosave
    }

    pub fn host(&self) -> &H {
        self.coordinator.host()
    }

    pub fn metadata(&self) -> Option<Metadata> {
        self.coordinator.metadata()
    }

    pub fn is_dirty(&self) -> bool {
        self.coordinator.is_dirty()
    }

    pub fn status(&self) -> watch::Receiver<SaveStatus> {
        self.coordinator.status()
    }

    /// Replace the document. Autosave stays off while the widgets are
    /// refilled and is switched back on afterwards, even if the load fails.
    pub async fn load(&self, snapshot: DocumentSnapshot) -> Result<()> {
        self.autosave.suspend();
        let result = self.coordinator.load(snapshot).await;
        self.autosave.resume();
        result
    }

    /// A widget reported a content change.
    pub fn mark_dirty(&self) {
        self.coordinator.mark_dirty();
        self.autosave.notify_mutation();
    }

    /// Explicit user save. Runs even when nothing changed.
    pub async fn save_now(&self) -> Result<SaveOutcome> {
        self.autosave.cancel();
        self.coordinator.save(true).await
    }

    pub fn intercept_navigation<N: NavigationController>(
        &self,
        controller: N,
        allowance: NavigationAllowance,
    ) -> NavigationInterceptor<H, N> {
        NavigationInterceptor::new(self.coordinator.clone(), controller, allowance)
    }
}
