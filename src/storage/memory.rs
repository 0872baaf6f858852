//! In-memory object store.
//!
//! Objects are held in a `tokio::sync::RwLock<HashMap<...>>`.  Nothing is
//! persisted; useful for tests and throwaway deployments.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use super::backend::{content_hash, ObjectBody, ObjectStore, ObjectSummary, StoredObject};

/// In-memory object store.
#[derive(Default)]
pub struct MemoryObjectStore {
    /// key -> (data, upload time).
    objects: tokio::sync::RwLock<HashMap<String, (Bytes, DateTime<Utc>)>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(
        &self,
        key: &str,
        data: Bytes,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let hash = content_hash(&data);
            let mut objects = self.objects.write().await;
            objects.insert(key, (data, Utc::now()));
            Ok(hash)
        })
    }

    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<StoredObject>>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let objects = self.objects.read().await;
            Ok(objects.get(&key).map(|(data, uploaded)| StoredObject {
                body: ObjectBody::Bytes(data.clone()),
                size: data.len() as u64,
                uploaded: *uploaded,
                content_hash: content_hash(data),
            }))
        })
    }

    fn list(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<ObjectSummary>>> + Send + '_>> {
        Box::pin(async move {
            let objects = self.objects.read().await;
            Ok(objects
                .iter()
                .map(|(key, (data, uploaded))| ObjectSummary {
                    key: key.clone(),
                    size: data.len() as u64,
                    uploaded: *uploaded,
                })
                .collect())
        })
    }
}
