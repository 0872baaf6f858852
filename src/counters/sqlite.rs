//! SQLite-backed counter store.
//!
//! Uses `rusqlite` with the `bundled` feature so no system SQLite
//! library is required.  All async trait methods are thin wrappers
//! around synchronous rusqlite calls executed under a `Mutex`.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::store::CounterStore;

/// Counter store backed by a single SQLite database file.
pub struct SqliteCounterStore {
    /// The database connection, guarded by a mutex for Send + Sync.
    conn: Mutex<Connection>,
}

impl SqliteCounterStore {
    /// Open (or create) the database at `path` and initialize the schema.
    ///
    /// Passing `":memory:"` creates an in-memory database (useful for tests).
    pub fn new(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;

            CREATE TABLE IF NOT EXISTS counters (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("counter store mutex poisoned"))
    }
}

impl CounterStore for SqliteCounterStore {
    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let conn = self.lock()?;
            let value = conn
                .query_row(
                    "SELECT value FROM counters WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(value)
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
            let now = chrono::Utc::now().to_rfc3339();
            let conn = self.lock()?;
            conn.execute(
                "INSERT INTO counters (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                params![key, value, now],
            )?;
            Ok(())
        })
    }

    fn delete(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let conn = self.lock()?;
            conn.execute("DELETE FROM counters WHERE key = ?1", params![key])?;
            Ok(())
        })
    }

    fn list(
        &self,
        prefix: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>> {
        let prefix = prefix.to_string();
        Box::pin(async move {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(
                "SELECT key FROM counters
                 WHERE substr(key, 1, length(?1)) = ?1
                 ORDER BY key",
            )?;
            let rows = stmt.query_map(params![prefix], |row| row.get::<_, String>(0))?;
            let mut keys = Vec::new();
            for row in rows {
                keys.push(row?);
            }
            Ok(keys)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let store = SqliteCounterStore::new(":memory:").unwrap();
        assert_eq!(store.get("download:a.pdf").await.unwrap(), None);

        store.put("download:a.pdf", "1").await.unwrap();
        store.put("download:a.pdf", "2").await.unwrap();
        assert_eq!(
            store.get("download:a.pdf").await.unwrap().as_deref(),
            Some("2")
        );
    }

    #[tokio::test]
    async fn test_delete() {
        let store = SqliteCounterStore::new(":memory:").unwrap();
        store.put("k", "5").await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_prefix_treats_wildcards_literally() {
        let store = SqliteCounterStore::new(":memory:").unwrap();
        store.put("download:x_1.pdf", "1").await.unwrap();
        store.put("download:sub/y%.pdf", "1").await.unwrap();
        store.put("downloadXz.pdf", "1").await.unwrap();
        store.put("probe:1", "1").await.unwrap();

        let keys = store.list("download:").await.unwrap();
        assert_eq!(keys, vec!["download:sub/y%.pdf", "download:x_1.pdf"]);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("counters.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteCounterStore::new(path).unwrap();
            store.put("download:a.zip", "42").await.unwrap();
        }

        let store = SqliteCounterStore::new(path).unwrap();
        assert_eq!(
            store.get("download:a.zip").await.unwrap().as_deref(),
            Some("42")
        );
    }
}
