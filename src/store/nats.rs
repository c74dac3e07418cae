//! NATS JetStream key-value document store
//!
//! The whole document lives under one key of one bucket. The bucket is
//! created on first connect if it doesn't exist.

use std::time::Duration;

use async_nats::jetstream::{self, kv};
use async_nats::ConnectOptions;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{future, StreamExt};
use tracing::{info, warn};

use super::{DocumentStore, DocumentStream, StoreError};
use crate::model::SharedDocument;

/// Revisions kept per key
const HISTORY: i64 = 5;

const PING_INTERVAL: Duration = Duration::from_secs(120);

/// Connection settings for [`NatsKvStore`].
#[derive(Debug, Clone)]
pub struct NatsKvConfig {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub bucket: String,
    pub key: String,
}

pub struct NatsKvStore {
    store: kv::Store,
    key: String,
}

impl NatsKvStore {
    pub async fn connect(config: &NatsKvConfig) -> Result<Self, StoreError> {
        info!(url = %config.url, bucket = %config.bucket, "Connecting to NATS");

        let mut options = ConnectOptions::new()
            .name("receipts")
            .ping_interval(PING_INTERVAL)
            .connection_timeout(Duration::from_secs(5));

        if let (Some(user), Some(pass)) = (&config.user, &config.password) {
            options = options.user_and_password(user.clone(), pass.clone());
        }

        let client = options
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to connect: {}", e)))?;

        let context = jetstream::new(client);
        let store = match context.get_key_value(&config.bucket).await {
            Ok(store) => store,
            Err(_) => {
                info!(bucket = %config.bucket, "Creating key-value bucket");
                context
                    .create_key_value(kv::Config {
                        bucket: config.bucket.clone(),
                        history: HISTORY,
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| StoreError::Unavailable(format!("Bucket unavailable: {}", e)))?
            }
        };

        info!(bucket = %config.bucket, key = %config.key, "Connected to NATS document store");

        Ok(Self {
            store,
            key: config.key.clone(),
        })
    }
}

#[async_trait]
impl DocumentStore for NatsKvStore {
    fn id(&self) -> &str {
        "nats"
    }

    async fn fetch(&self) -> Result<Option<SharedDocument>, StoreError> {
        let value = self
            .store
            .get(&self.key)
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;

        match value {
            Some(bytes) if !bytes.is_empty() => Ok(Some(SharedDocument::decode(&bytes)?)),
            _ => Ok(None),
        }
    }

    async fn write(&self, doc: &SharedDocument) -> Result<(), StoreError> {
        let encoded = Bytes::from(doc.encode()?);
        self.store
            .put(&self.key, encoded)
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<DocumentStream, StoreError> {
        let watch = self
            .store
            .watch(&self.key)
            .await
            .map_err(|e| StoreError::Subscribe(e.to_string()))?;

        let stream = watch.filter_map(|entry| {
            future::ready(match entry {
                Ok(entry) if matches!(entry.operation, kv::Operation::Put) => {
                    match SharedDocument::decode(&entry.value) {
                        Ok(doc) => Some(doc),
                        Err(e) => {
                            warn!(revision = entry.revision, error = %e, "Dropping undecodable document push");
                            None
                        }
                    }
                }
                Ok(_) => None,
                Err(e) => {
                    warn!(error = %e, "Document watch error");
                    None
                }
            })
        });
        Ok(stream.boxed())
    }
}
