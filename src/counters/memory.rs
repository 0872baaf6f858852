//! In-memory counter store.
//!
//! Stores all values in memory with no persistence. Useful for testing
//! and ephemeral deployments. Uses `RwLock<BTreeMap>` for thread-safe
//! access and ordered prefix scans.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use super::store::CounterStore;

#[derive(Default)]
pub struct MemoryCounterStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> anyhow::Error {
    anyhow::anyhow!("counter map lock poisoned")
}

impl CounterStore for MemoryCounterStore {
    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let values = self.values.read().map_err(poisoned)?;
            Ok(values.get(&key).cloned())
        })
    }

    fn put(
        &self,
        key: &str,
        value: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        let value = value.to_string();
        Box::pin(async move {
            let mut values = self.values.write().map_err(poisoned)?;
            values.insert(key, value);
            Ok(())
        })
    }

    fn delete(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut values = self.values.write().map_err(poisoned)?;
            values.remove(&key);
            Ok(())
        })
    }

    fn list(
        &self,
        prefix: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>> {
        let prefix = prefix.to_string();
        Box::pin(async move {
            let values = self.values.read().map_err(poisoned)?;
            Ok(values
                .range(prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&prefix))
                .map(|(k, _)| k.clone())
                .collect())
        })
    }
}
