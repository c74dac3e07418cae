//! Synchronization layer
//!
//! Owns the local mirror of the shared document. Every mutation goes through
//! [`SyncLayer::commit`], which updates the mirror first and then writes the
//! whole document to the store. Pushes from the store replace the mirror
//! outright; there is no field-level merge, so concurrent writers from
//! different processes overwrite each other.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::SharedDocument;
use crate::store::{DocumentStore, StoreError};

/// Shown when a change was kept locally but could not be written
pub const PERSIST_WARNING: &str = "Failed to save. Check your internet connection.";

const EVENT_CAPACITY: usize = 32;

/// Pushed to connected viewers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClubEvent {
    /// A remote change replaced the document
    Updated {
        #[serde(rename = "lastUpdated")]
        last_updated: Option<DateTime<Utc>>,
    },
}

/// How the initial load went
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    Found,
    /// Nothing stored yet; running on defaults
    Empty,
    /// Store unreachable; running on defaults
    Failed,
}

/// A successful local mutation and whether it reached the store
#[derive(Debug)]
pub struct Committed<T> {
    pub value: T,
    pub persisted: bool,
}

impl<T> Committed<T> {
    pub fn warning(&self) -> Option<&'static str> {
        (!self.persisted).then_some(PERSIST_WARNING)
    }
}

pub struct SyncLayer {
    store: Arc<dyn DocumentStore>,
    mirror: RwLock<SharedDocument>,
    /// Serializes commits so writes reach the store in mutation order
    commit_lock: Mutex<()>,
    events: broadcast::Sender<ClubEvent>,
}

impl SyncLayer {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            mirror: RwLock::new(SharedDocument::default()),
            commit_lock: Mutex::new(()),
            events,
        }
    }

    /// Fetch the document once. Absence and failure both leave defaults in
    /// place; neither is an error.
    pub async fn load(&self) -> LoadState {
        match self.store.fetch().await {
            Ok(Some(doc)) => {
                info!(
                    store = self.store.id(),
                    participants = doc.participants.len(),
                    reflections = doc.reflections.len(),
                    "Loaded shared document"
                );
                *self.mirror.write().await = doc;
                LoadState::Found
            }
            Ok(None) => {
                info!(store = self.store.id(), "No shared document yet, starting empty");
                LoadState::Empty
            }
            Err(e) => {
                warn!(store = self.store.id(), error = %e, "Failed to load shared document, starting empty");
                LoadState::Failed
            }
        }
    }

    pub async fn snapshot(&self) -> SharedDocument {
        self.mirror.read().await.clone()
    }

    /// Run `f` against the mirror without mutating it.
    pub async fn read<R>(&self, f: impl FnOnce(&SharedDocument) -> R) -> R {
        f(&*self.mirror.read().await)
    }

    /// Apply `f` to a copy of the document. On `Err` nothing changes and
    /// nothing is written. On `Ok` the copy is stamped, becomes the mirror,
    /// and is written whole; a failed write is logged and reported through
    /// [`Committed::persisted`] without rolling back.
    pub async fn commit<T>(
        &self,
        f: impl FnOnce(&mut SharedDocument) -> Result<T>,
    ) -> Result<Committed<T>> {
        let _serial = self.commit_lock.lock().await;

        let (value, doc) = {
            let mut mirror = self.mirror.write().await;
            let mut draft = mirror.clone();
            let value = f(&mut draft)?;
            draft.last_updated = Some(Utc::now());
            *mirror = draft;
            (value, mirror.clone())
        };

        let persisted = match self.persist(&doc).await {
            Ok(()) => true,
            Err(e) => {
                warn!(store = self.store.id(), error = %e, "Failed to persist shared document");
                false
            }
        };

        Ok(Committed { value, persisted })
    }

    async fn persist(&self, doc: &SharedDocument) -> std::result::Result<(), StoreError> {
        self.store.write(doc).await?;
        debug!(store = self.store.id(), "Persisted shared document");
        Ok(())
    }

    /// Replace the mirror with a pushed document. Returns whether anything
    /// changed; viewers are told only then.
    pub async fn apply_remote(&self, doc: SharedDocument) -> bool {
        let mut mirror = self.mirror.write().await;
        if *mirror == doc {
            return false;
        }
        let last_updated = doc.last_updated;
        *mirror = doc;
        drop(mirror);

        debug!(?last_updated, "Applied remote document");
        // No viewers connected is fine
        let _ = self.events.send(ClubEvent::Updated { last_updated });
        true
    }

    pub fn events(&self) -> broadcast::Receiver<ClubEvent> {
        self.events.subscribe()
    }

    /// Subscribe to the store and apply every push until the stream ends.
    pub async fn spawn_watch(self: Arc<Self>) -> std::result::Result<JoinHandle<()>, StoreError> {
        let mut updates = self.store.subscribe().await?;
        info!(store = self.store.id(), "Watching shared document");

        Ok(tokio::spawn(async move {
            while let Some(doc) = updates.next().await {
                self.apply_remote(doc).await;
            }
            warn!(store = self.store.id(), "Shared document watch ended");
        }))
    }
}
