//! Abstract object store trait.
//!
//! Every storage backend must implement [`ObjectStore`].  Keys are opaque
//! strings; a `/` inside a key names a logical subfolder and is never
//! interpreted as a hierarchy by callers.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Content of a stored file, either buffered or an open file handle to
/// stream from.
#[derive(Debug)]
pub enum ObjectBody {
    Bytes(Bytes),
    File(tokio::fs::File),
}

impl ObjectBody {
    /// Read the whole body into memory.
    pub async fn into_bytes(self) -> anyhow::Result<Bytes> {
        match self {
            ObjectBody::Bytes(data) => Ok(data),
            ObjectBody::File(mut file) => {
                use tokio::io::AsyncReadExt;
                let mut buf = Vec::new();
                file.read_to_end(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

/// A stored file's content plus metadata.
#[derive(Debug)]
pub struct StoredObject {
    /// File content.
    pub body: ObjectBody,
    /// Size in bytes.
    pub size: u64,
    /// When the file was last written.
    pub uploaded: DateTime<Utc>,
    /// Hex-encoded SHA-256 of the content.
    pub content_hash: String,
}

/// One entry of an object listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub uploaded: DateTime<Utc>,
}

/// Async object storage contract.
pub trait ObjectStore: Send + Sync + 'static {
    /// Write `data` to `key`, returning the content hash.
    fn put(
        &self,
        key: &str,
        data: Bytes,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>>;

    /// Open the object at `key`. `Ok(None)` when nothing is stored there.
    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<StoredObject>>> + Send + '_>>;

    /// List every stored object. No ordering is guaranteed.
    fn list(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<ObjectSummary>>> + Send + '_>>;
}

/// Hex SHA-256 of `data`.
pub fn content_hash(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
