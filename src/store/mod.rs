//! Remote document store
//!
//! One logical document, fetched once, written whole, and observed through
//! a push stream that yields the full body on every change.

pub mod memory;
pub mod nats;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::model::SharedDocument;

pub use memory::MemoryStore;
pub use nats::NatsKvStore;

/// Error types for document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Read failed: {0}")]
    Read(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Invalid document: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Pushed documents, newest last. Undecodable pushes are dropped.
pub type DocumentStream = BoxStream<'static, SharedDocument>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short name for logs.
    fn id(&self) -> &str;

    /// The stored document, or `None` if nothing has been written yet.
    async fn fetch(&self) -> Result<Option<SharedDocument>, StoreError>;

    /// Replace the stored document.
    async fn write(&self, doc: &SharedDocument) -> Result<(), StoreError>;

    /// Changes written after this call, by anyone.
    async fn subscribe(&self) -> Result<DocumentStream, StoreError>;
}
