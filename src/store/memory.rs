//! In-process document store
//!
//! Holds the encoded document and rebroadcasts every write. Several clubs
//! sharing one `MemoryStore` behave like several clients of a remote store.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{future, StreamExt};
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

use super::{DocumentStore, DocumentStream, StoreError};
use crate::model::SharedDocument;

const CHANNEL_CAPACITY: usize = 64;

pub struct MemoryStore {
    current: RwLock<Option<Bytes>>,
    updates: broadcast::Sender<Bytes>,
    unavailable: AtomicBool,
    writes: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            current: RwLock::new(None),
            updates,
            unavailable: AtomicBool::new(false),
            writes: AtomicU32::new(0),
        }
    }

    /// A store that already holds `doc`.
    pub fn with_document(doc: &SharedDocument) -> Result<Self, StoreError> {
        let encoded = Bytes::from(doc.encode()?);
        Ok(Self {
            current: RwLock::new(Some(encoded)),
            ..Self::new()
        })
    }

    /// Make every call fail, as if the network were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw stored bytes, for inspecting the wire form.
    pub async fn raw(&self) -> Option<Bytes> {
        self.current.read().await.clone()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store switched off".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn id(&self) -> &str {
        "memory"
    }

    async fn fetch(&self) -> Result<Option<SharedDocument>, StoreError> {
        self.check_available()?;
        match self.current.read().await.as_ref() {
            Some(bytes) => Ok(Some(SharedDocument::decode(bytes)?)),
            None => Ok(None),
        }
    }

    async fn write(&self, doc: &SharedDocument) -> Result<(), StoreError> {
        self.check_available()?;
        let encoded = Bytes::from(doc.encode()?);
        *self.current.write().await = Some(encoded.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        // No receivers is fine
        let _ = self.updates.send(encoded);
        Ok(())
    }

    async fn subscribe(&self) -> Result<DocumentStream, StoreError> {
        self.check_available()?;
        let stream = BroadcastStream::new(self.updates.subscribe()).filter_map(|update| {
            future::ready(match update {
                Ok(bytes) => match SharedDocument::decode(&bytes) {
                    Ok(doc) => Some(doc),
                    Err(e) => {
                        warn!(error = %e, "Dropping undecodable document push");
                        None
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Document subscriber lagged");
                    None
                }
            })
        });
        Ok(stream.boxed())
    }
}
