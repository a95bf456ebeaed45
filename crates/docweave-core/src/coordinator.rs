//! Save coordination: dirty tracking and the one-at-a-time save pipeline.
//!
//! Every save, whether from the autosave timer, an explicit user action, or
//! the navigation interceptor, goes through [`SaveCoordinator::save`]. The
//! pipeline (snapshot, decode, transport) runs inside an async critical
//! section, so two saves never interleave. Callers that arrive while a save
//! is in flight queue behind it in FIFO order, and skip once they get in if
//! the save ahead of them already captured every edit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use smol_str::{SmolStr, ToSmolStr};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, trace, warn};

use crate::capability::{Host, Transport};
use crate::config::SessionConfig;
use crate::error::{DocweaveError, Result};
use crate::snapshot::SnapshotBuilder;
use crate::types::{DocumentSnapshot, Metadata, UpdatePayload};

/// What the dirty indicator should show.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveStatus {
    /// Everything the user typed is stored.
    #[default]
    Clean,
    /// Unsaved edits exist.
    Dirty,
    /// A save pipeline is running.
    Saving,
    /// The last save failed. `unsaved` tells whether edits are pending.
    Failed { message: SmolStr, unsaved: bool },
}

impl SaveStatus {
    /// Returns true if unsaved edits exist.
    pub fn is_dirty(&self) -> bool {
        match self {
            Self::Clean => false,
            Self::Dirty | Self::Saving => true,
            Self::Failed { unsaved, .. } => *unsaved,
        }
    }

    /// Returns the error message if the last save failed.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }

    fn settled(dirty: bool) -> Self {
        if dirty { Self::Dirty } else { Self::Clean }
    }
}

/// Result of a save request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing to do: not forced and not dirty.
    Skipped,
    /// The transport confirmed delivery.
    Saved,
}

/// Edit and save generations.
///
/// Dirty means the edit counter is ahead of the generation the last
/// confirmed save captured.
#[derive(Debug, Default)]
struct DirtyState {
    edits: AtomicU64,
    saved: AtomicU64,
}

impl DirtyState {
    fn is_dirty(&self) -> bool {
        self.edits.load(Ordering::Acquire) != self.saved.load(Ordering::Acquire)
    }

    fn current(&self) -> u64 {
        self.edits.load(Ordering::Acquire)
    }
}

struct Inner<H> {
    host: H,
    builder: SnapshotBuilder,
    metadata: RwLock<Option<Metadata>>,
    dirty: DirtyState,
    pipeline: Mutex<()>,
    status: watch::Sender<SaveStatus>,
}

/// Takes the indicator out of `Saving` when a save future is dropped mid-flight.
struct SavingGuard<'a, H>(&'a Inner<H>);

impl<H> Drop for SavingGuard<'_, H> {
    fn drop(&mut self) {
        debug!("save abandoned before the transport answered");
        self.0
            .status
            .send_replace(SaveStatus::settled(self.0.dirty.is_dirty()));
    }
}

/// Owns the session's dirty state and serializes saves.
///
/// Cheap to clone; clones share state.
pub struct SaveCoordinator<H> {
    inner: Arc<Inner<H>>,
}

impl<H> Clone for SaveCoordinator<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<H: Host> SaveCoordinator<H> {
    pub fn new(host: H, config: SessionConfig) -> Self {
        let (status, _) = watch::channel(SaveStatus::Clean);
        Self {
            inner: Arc::new(Inner {
                host,
                builder: SnapshotBuilder::new(config),
                metadata: RwLock::new(None),
                dirty: DirtyState::default(),
                pipeline: Mutex::new(()),
                status,
            }),
        }
    }

    pub fn host(&self) -> &H {
        &self.inner.host
    }

    /// Metadata of the loaded document, if any.
    pub fn metadata(&self) -> Option<Metadata> {
        self.inner
            .metadata
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.is_dirty()
    }

    /// Subscribe to dirty indicator changes.
    pub fn status(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status.subscribe()
    }

    /// Record a tracked content mutation.
    pub fn mark_dirty(&self) {
        self.inner.dirty.edits.fetch_add(1, Ordering::AcqRel);
        self.inner.status.send_if_modified(|status| match status {
            SaveStatus::Clean => {
                *status = SaveStatus::Dirty;
                true
            }
            SaveStatus::Failed { unsaved, .. } if !*unsaved => {
                *unsaved = true;
                true
            }
            _ => false,
        });
    }

    /// Save the current document.
    ///
    /// Without `force` this is a no-op unless the document is dirty. The
    /// document is marked clean only once the transport confirms, and only
    /// up to the edits the snapshot captured.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn save(&self, force: bool) -> Result<SaveOutcome> {
        if !force && !self.is_dirty() {
            trace!("save skipped, document clean");
            return Ok(SaveOutcome::Skipped);
        }

        let _pipeline = self.inner.pipeline.lock().await;
        if !force && !self.is_dirty() {
            trace!("save skipped, captured by the previous save");
            return Ok(SaveOutcome::Skipped);
        }

        let metadata = self.metadata().ok_or(DocweaveError::NotLoaded)?;
        let captured = self.inner.dirty.current();
        self.inner.status.send_replace(SaveStatus::Saving);
        let saving = SavingGuard(&self.inner);

        let result = self.run_pipeline(&metadata).await;
        std::mem::forget(saving);
        match result {
            Ok(()) => {
                self.inner.dirty.saved.fetch_max(captured, Ordering::AcqRel);
                let dirty = self.is_dirty();
                info!(generation = captured, still_dirty = dirty, "save confirmed");
                self.inner.status.send_replace(SaveStatus::settled(dirty));
                Ok(SaveOutcome::Saved)
            }
            Err(e) => {
                warn!(error = %e, "save failed");
                self.inner.status.send_replace(SaveStatus::Failed {
                    message: e.to_smolstr(),
                    unsaved: self.is_dirty(),
                });
                Err(e)
            }
        }
    }

    async fn run_pipeline(&self, metadata: &Metadata) -> Result<()> {
        let snapshot = self.inner.builder.build(&self.inner.host, metadata).await?;
        let payload = UpdatePayload::new(snapshot);
        debug!("handing payload to transport");
        self.inner.host.transport().send(payload).await?;
        Ok(())
    }

    /// Install a freshly loaded document into the widgets.
    ///
    /// Runs inside the save critical section. Mutations the widgets report
    /// while their content is replaced do not leave the document dirty.
    #[tracing::instrument(skip_all, fields(mode = %snapshot.metadata.mode), level = "debug")]
    pub async fn load(&self, snapshot: DocumentSnapshot) -> Result<()> {
        let _pipeline = self.inner.pipeline.lock().await;
        self.inner.builder.apply(&self.inner.host, &snapshot).await?;
        *self
            .inner
            .metadata
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(snapshot.metadata);
        let current = self.inner.dirty.current();
        self.inner.dirty.saved.store(current, Ordering::Release);
        self.inner.status.send_replace(SaveStatus::Clean);
        info!("document loaded");
        Ok(())
    }
}
