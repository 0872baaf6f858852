//! Abstract counter store trait.
//!
//! A counter store is a flat string key/value map.  Values are small
//! strings; the download counters keep decimal integers in them.  The
//! trait uses pinned boxed futures so it can front both in-process maps
//! and remote services.

use std::future::Future;
use std::pin::Pin;

/// Async key/value contract used for download counters.
pub trait CounterStore: Send + Sync + 'static {
    /// Read the value stored under `key`.
    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + '_>>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(
        &self,
        key: &str,
        value: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Remove `key`. Deleting an absent key succeeds.
    fn delete(&self, key: &str)
        -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Every key starting with `prefix`, in ascending order.
    fn list(
        &self,
        prefix: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>>;
}
