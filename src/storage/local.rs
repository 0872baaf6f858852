//! Local filesystem object store.
//!
//! Files are stored under a configurable root directory.  The key is used
//! directly as a relative path, so `reports/2024/q1.pdf` lands in nested
//! directories.
//!
//! All writes follow crash-only design: write to temp file, fsync, rename.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;

use sha2::{Digest, Sha256};

use super::backend::{content_hash, ObjectBody, ObjectStore, ObjectSummary, StoredObject};

/// Directory under the root that holds in-flight temp files. Keys may not
/// start with it.
pub const TMP_DIR: &str = ".tmp";

/// Read size used when hashing a file for its ETag.
const HASH_CHUNK: usize = 64 * 1024;

/// Stores files on the local filesystem.
pub struct LocalObjectStore {
    /// Root directory for all stored files.
    root: PathBuf,
}

impl LocalObjectStore {
    /// Create a new `LocalObjectStore` rooted at `root`.
    ///
    /// The directory will be created if it does not exist.
    pub fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        std::fs::create_dir_all(root.join(TMP_DIR))?;
        Ok(Self { root })
    }

    /// Resolve a key to a file path inside the root.
    ///
    /// Rejects keys that would escape the root (`..`, absolute paths) and
    /// keys addressing the temp directory.
    fn resolve(&self, key: &str) -> anyhow::Result<PathBuf> {
        let relative = Path::new(key);
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                Component::CurDir => {}
                _ => anyhow::bail!("Path traversal detected in key: {key}"),
            }
        }
        if relative
            .components()
            .next()
            .is_some_and(|c| c.as_os_str() == TMP_DIR)
        {
            anyhow::bail!("Reserved key: {key}");
        }
        Ok(self.root.join(relative))
    }

    /// Generate a temp file path under .tmp/ for atomic writes.
    fn temp_path(&self) -> PathBuf {
        let id = uuid::Uuid::new_v4();
        self.root.join(TMP_DIR).join(format!("tmp-{id}"))
    }

    /// Recursively collect files under `dir` into `out`.
    fn walk(&self, dir: &Path, out: &mut Vec<ObjectSummary>) -> anyhow::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;

            if file_type.is_dir() {
                if dir == self.root && entry.file_name() == TMP_DIR {
                    continue;
                }
                self.walk(&path, out)?;
            } else if file_type.is_file() {
                let meta = entry.metadata()?;
                let relative = path.strip_prefix(&self.root)?;
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push(ObjectSummary {
                    key,
                    size: meta.len(),
                    uploaded: modified_time(&meta),
                });
            }
        }
        Ok(())
    }
}

/// Hex SHA-256 of everything `reader` yields, read in chunks.
fn hash_reader(reader: &mut impl Read) -> anyhow::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_CHUNK];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn modified_time(meta: &std::fs::Metadata) -> DateTime<Utc> {
    meta.modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

impl ObjectStore for LocalObjectStore {
    fn put(
        &self,
        key: &str,
        data: Bytes,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let final_path = self.resolve(&key)?;

            // Keys with '/' separators need their parent directories.
            if let Some(parent) = final_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let hash = content_hash(&data);

            // Crash-only: temp-fsync-rename pattern.
            let tmp_path = self.temp_path();
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(&data)?;
            file.sync_all()?;
            std::fs::rename(&tmp_path, &final_path)?;

            Ok(hash)
        })
    }

    fn get(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<StoredObject>>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            let path = self.resolve(&key)?;
            if !path.is_file() {
                return Ok(None);
            }

            // Hash and stream from the same handle; a rename-over leaves it
            // pointing at one version.
            let mut file = std::fs::File::open(&path)?;
            let meta = file.metadata()?;
            let content_hash = hash_reader(&mut file)?;
            file.seek(SeekFrom::Start(0))?;

            Ok(Some(StoredObject {
                body: ObjectBody::File(tokio::fs::File::from_std(file)),
                size: meta.len(),
                uploaded: modified_time(&meta),
                content_hash,
            }))
        })
    }

    fn list(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<ObjectSummary>>> + Send + '_>> {
        Box::pin(async move {
            let mut out = Vec::new();
            self.walk(&self.root, &mut out)?;
            Ok(out)
        })
    }
}

// ── Tests ───────────────────────────────────────────────────────────
