//! Download counters.
//!
//! One counter per file key, kept as a decimal string under
//! `download:<key>` in a [`store::CounterStore`].  An absent counter reads
//! as zero; a reset deletes the entry.
//!
//! Increments are read-modify-write and are not atomic: two concurrent
//! increments of the same key can both read `n` and both write `n + 1`.
//! Counts are therefore approximate.

pub mod memory;
pub mod sqlite;
pub mod store;

use std::sync::Arc;

use tracing::warn;

use self::store::CounterStore;

/// Namespace prefix for every download counter key.
pub const COUNTER_PREFIX: &str = "download:";

/// Counter key for a file key.
pub fn counter_key(file_key: &str) -> String {
    format!("{COUNTER_PREFIX}{file_key}")
}

/// Parse a stored counter value. Non-numeric values count as zero.
fn parse_count(key: &str, raw: &str) -> u64 {
    match raw.trim().parse::<u64>() {
        Ok(n) => n,
        Err(_) => {
            warn!(key = %key, value = %raw, "Unparsable counter value, treating as 0");
            0
        }
    }
}

/// Download counter bookkeeping over a counter store.
#[derive(Clone)]
pub struct DownloadCounters {
    store: Arc<dyn CounterStore>,
}

impl DownloadCounters {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// The underlying store, for the key/value self-test.
    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    /// Add one to the counter for `file_key`, returning the written value.
    pub async fn increment(&self, file_key: &str) -> anyhow::Result<u64> {
        let key = counter_key(file_key);
        let current = match self.store.get(&key).await? {
            Some(raw) => parse_count(&key, &raw),
            None => 0,
        };
        let next = current + 1;
        self.store.put(&key, &next.to_string()).await?;
        Ok(next)
    }

    /// Current count for `file_key`; 0 when absent.
    pub async fn read(&self, file_key: &str) -> anyhow::Result<u64> {
        let key = counter_key(file_key);
        Ok(match self.store.get(&key).await? {
            Some(raw) => parse_count(&key, &raw),
            None => 0,
        })
    }

    /// Delete the counter for `file_key`, returning it to the implicit zero.
    pub async fn reset(&self, file_key: &str) -> anyhow::Result<()> {
        self.store.delete(&counter_key(file_key)).await
    }

    /// Every counted file as `(file_key, count)`, ordered by key.
    pub async fn list_all(&self) -> anyhow::Result<Vec<(String, u64)>> {
        let keys = self.store.list(COUNTER_PREFIX).await?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            // Deleted between list and get: skip.
            let Some(raw) = self.store.get(&key).await? else {
                continue;
            };
            let file_key = key[COUNTER_PREFIX.len()..].to_string();
            out.push((file_key, parse_count(&key, &raw)));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryCounterStore;
    use super::*;
    use std::future::Future;
    use std::pin::Pin;

    fn counters() -> DownloadCounters {
        DownloadCounters::new(Arc::new(MemoryCounterStore::new()))
    }

    #[test]
    fn test_counter_key() {
        assert_eq!(counter_key("docs/a.pdf"), "download:docs/a.pdf");
    }

    #[tokio::test]
    async fn test_absent_reads_zero() {
        assert_eq!(counters().read("a.pdf").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_increment_sequence() {
        let c = counters();
        assert_eq!(c.increment("a.pdf").await.unwrap(), 1);
        assert_eq!(c.increment("a.pdf").await.unwrap(), 2);
        assert_eq!(c.increment("a.pdf").await.unwrap(), 3);
        assert_eq!(c.read("a.pdf").await.unwrap(), 3);
        assert_eq!(
            c.store().get("download:a.pdf").await.unwrap().as_deref(),
            Some("3")
        );
    }

    #[tokio::test]
    async fn test_reset_returns_to_zero() {
        let c = counters();
        c.increment("a.pdf").await.unwrap();
        c.reset("a.pdf").await.unwrap();
        assert_eq!(c.read("a.pdf").await.unwrap(), 0);
        assert_eq!(c.store().get("download:a.pdf").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_garbage_value_counts_as_zero() {
        let c = counters();
        c.store().put("download:a.pdf", "lots").await.unwrap();
        assert_eq!(c.read("a.pdf").await.unwrap(), 0);
        assert_eq!(c.increment("a.pdf").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_all_strips_prefix() {
        let c = counters();
        c.increment("b.zip").await.unwrap();
        c.increment("sub/a.pdf").await.unwrap();
        c.increment("sub/a.pdf").await.unwrap();
        c.store().put("probe:x", "1").await.unwrap();

        let all = c.list_all().await.unwrap();
        assert_eq!(
            all,
            vec![("b.zip".to_string(), 1), ("sub/a.pdf".to_string(), 2)]
        );
    }

    /// Store that yields after every read, so two concurrent
    /// read-modify-write cycles interleave deterministically.
    struct InterleavingStore(MemoryCounterStore);

    impl CounterStore for InterleavingStore {
        fn get(
            &self,
            key: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + '_>> {
            let key = key.to_string();
            Box::pin(async move {
                let value = self.0.get(&key).await?;
                tokio::task::yield_now().await;
                Ok(value)
            })
        }

        fn put(
            &self,
            key: &str,
            value: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
            self.0.put(key, value)
        }

        fn delete(
            &self,
            key: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
            self.0.delete(key)
        }

        fn list(
            &self,
            prefix: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>> {
            self.0.list(prefix)
        }
    }

    #[tokio::test]
    async fn test_concurrent_increments_can_lose_an_update() {
        let c = DownloadCounters::new(Arc::new(InterleavingStore(MemoryCounterStore::new())));

        let (a, b) = tokio::join!(c.increment("fresh.pdf"), c.increment("fresh.pdf"));
        a.unwrap();
        b.unwrap();

        // Both cycles read 0 before either wrote: the lost update is possible.
        assert_eq!(c.read("fresh.pdf").await.unwrap(), 1);
    }
}
