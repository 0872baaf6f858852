//! Background download-count queue.
//!
//! ```text
//! download handler ── submit(key) ──► mpsc (bounded) ──► worker task
//!                     (never blocks;                     ├─ counters.increment(key)
//!                      full/closed → dropped + warn)     └─ failure → warn, swallowed
//! ```
//!
//! The response path never waits on the counter store.  At shutdown
//! [`CounterWorker::shutdown`] closes the channel and the worker drains
//! whatever is still buffered before exiting.
//!
//! The single worker applies increments one at a time, so increments
//! submitted to one process do not race each other.  Processes sharing a
//! counter store still can (see [`crate::counters`]).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::counters::DownloadCounters;
use crate::metrics::{COUNTER_INCREMENTS_TOTAL, COUNTER_INCREMENT_ERRORS_TOTAL};

/// Tracks submitted-but-unapplied increments so callers can wait for them.
#[derive(Default)]
struct Pending {
    count: AtomicUsize,
    idle: Notify,
}

impl Pending {
    fn add(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn done(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Cloneable submission handle held by request handlers.
#[derive(Clone)]
pub struct CounterQueue {
    tx: mpsc::Sender<String>,
    pending: Arc<Pending>,
}

/// Owner of the background worker task.
pub struct CounterWorker {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Create a queue of `capacity` and spawn its worker on the current runtime.
pub fn spawn(counters: DownloadCounters, capacity: usize) -> (CounterQueue, CounterWorker) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let (stop_tx, stop_rx) = oneshot::channel();
    let pending = Arc::new(Pending::default());

    let handle = tokio::spawn(run_worker(rx, stop_rx, counters, Arc::clone(&pending)));

    (CounterQueue { tx, pending }, CounterWorker { stop_tx, handle })
}

impl CounterQueue {
    /// Queue an increment for `file_key` without waiting for it.
    ///
    /// Returns `false` when the increment was dropped (queue full or closed).
    pub fn submit(&self, file_key: &str) -> bool {
        self.pending.add();
        match self.tx.try_send(file_key.to_string()) {
            Ok(()) => true,
            Err(e) => {
                self.pending.done();
                counter!(COUNTER_INCREMENT_ERRORS_TOTAL, "reason" => "dropped").increment(1);
                warn!(key = %file_key, "Download count not queued: {e}");
                false
            }
        }
    }

    /// Wait until every increment submitted so far has been applied or
    /// has failed.
    pub async fn flush(&self) {
        loop {
            let idle = self.pending.idle.notified();
            if self.pending.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            idle.await;
        }
    }
}

impl CounterWorker {
    /// Stop accepting increments and drain the buffered ones, waiting at
    /// most `timeout`.
    pub async fn shutdown(self, timeout: Duration) {
        let _ = self.stop_tx.send(());
        match tokio::time::timeout(timeout, self.handle).await {
            Ok(Ok(())) => info!("Download counter queue drained"),
            Ok(Err(e)) => warn!("Download counter worker panicked: {e}"),
            Err(_) => warn!(
                "Download counter queue drain timed out after {}s; pending increments lost",
                timeout.as_secs()
            ),
        }
    }
}

async fn apply(counters: &DownloadCounters, pending: &Pending, key: String) {
    match counters.increment(&key).await {
        Ok(n) => {
            counter!(COUNTER_INCREMENTS_TOTAL).increment(1);
            debug!(key = %key, downloads = n, "Download counted");
        }
        Err(e) => {
            counter!(COUNTER_INCREMENT_ERRORS_TOTAL, "reason" => "store").increment(1);
            warn!(key = %key, "Failed to update download count: {e:#}");
        }
    }
    pending.done();
}

async fn run_worker(
    mut rx: mpsc::Receiver<String>,
    mut stop_rx: oneshot::Receiver<()>,
    counters: DownloadCounters,
    pending: Arc<Pending>,
) {
    loop {
        tokio::select! {
            key = rx.recv() => match key {
                Some(key) => apply(&counters, &pending, key).await,
                None => {
                    debug!("Download counter channel closed");
                    return;
                }
            },
            _ = &mut stop_rx => break,
        }
    }

    // Drain: no new sends are accepted, buffered keys are still delivered.
    rx.close();
    let mut drained = 0usize;
    while let Some(key) = rx.recv().await {
        apply(&counters, &pending, key).await;
        drained += 1;
    }
    debug!(count = drained, "Drained buffered download counts");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::memory::MemoryCounterStore;
    use crate::counters::store::CounterStore;
    use std::future::Future;
    use std::pin::Pin;

    fn counters() -> DownloadCounters {
        DownloadCounters::new(Arc::new(MemoryCounterStore::new()))
    }

    #[tokio::test]
    async fn test_submit_and_flush() {
        let counters = counters();
        let (queue, _worker) = spawn(counters.clone(), 16);

        for _ in 0..5 {
            assert!(queue.submit("a.pdf"));
        }
        queue.flush().await;

        assert_eq!(counters.read("a.pdf").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_flush_with_nothing_pending_returns() {
        let (queue, _worker) = spawn(counters(), 4);
        queue.flush().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_buffered() {
        let counters = counters();
        let (queue, worker) = spawn(counters.clone(), 64);

        for _ in 0..20 {
            queue.submit("b.zip");
        }
        worker.shutdown(Duration::from_secs(5)).await;

        assert_eq!(counters.read("b.zip").await.unwrap(), 20);
        assert!(!queue.submit("b.zip"));
    }

    struct FailingStore;

    impl CounterStore for FailingStore {
        fn get(
            &self,
            _key: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + '_>> {
            Box::pin(async { Err::<Option<String>, _>(anyhow::anyhow!("store offline")) })
        }

        fn put(
            &self,
            _key: &str,
            _value: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
            Box::pin(async { Err::<(), _>(anyhow::anyhow!("store offline")) })
        }

        fn delete(
            &self,
            _key: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
            Box::pin(async { Err::<(), _>(anyhow::anyhow!("store offline")) })
        }

        fn list(
            &self,
            _prefix: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>> {
            Box::pin(async { Err::<Vec<String>, _>(anyhow::anyhow!("store offline")) })
        }
    }

    #[tokio::test]
    async fn test_store_failures_are_swallowed() {
        let (queue, worker) = spawn(DownloadCounters::new(Arc::new(FailingStore)), 4);
        assert!(queue.submit("a.pdf"));
        queue.flush().await;
        worker.shutdown(Duration::from_secs(1)).await;
    }
}
