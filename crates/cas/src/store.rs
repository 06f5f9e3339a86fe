//! Blob storage backends.
//!
//! `FileStore` keeps blobs on the local filesystem with directory sharding:
//!
//! ```text
//! {base_path}/
//! └── objects/
//!     ├── ab/
//!     │   └── cde123...  # content file (remainder of hash)
//!     └── 12/
//!         └── 3456789...
//! ```
//!
//! `MemoryStore` holds everything in a map and exists for tests and
//! ephemeral deployments.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use anyhow::{Context, Result};

use crate::hash::ContentHash;

/// Staging names are unique per write; concurrent puts of identical
/// content must never rename each other's temp file out from under them.
static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Trait for content storage backends.
///
/// This allows for alternative implementations (e.g., in-memory for testing,
/// remote storage, caching layers).
pub trait ContentStore: Send + Sync {
    /// Store data, returning its content hash.
    ///
    /// If the data already exists, returns the hash without writing.
    fn put(&self, data: &[u8]) -> Result<ContentHash>;

    /// Retrieve data by its content hash.
    ///
    /// Returns `Ok(None)` if the hash was never stored.
    fn get(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>>;

    /// Check if content exists without retrieving it.
    fn exists(&self, hash: &ContentHash) -> bool;

    /// Number of distinct blobs held by this store.
    fn len(&self) -> Result<usize>;

    /// True if the store holds no blobs.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Filesystem-based content store.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
    read_only: bool,
}

impl FileStore {
    /// Create a FileStore at a specific path.
    ///
    /// Creates the objects directory if it doesn't exist.
    pub fn at_path(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            base_path: path.into(),
            read_only: false,
        };
        fs::create_dir_all(store.objects_dir())
            .context("failed to create CAS objects directory")?;
        Ok(store)
    }

    /// Create a read-only FileStore at a specific path.
    ///
    /// Useful for replicas that serve blobs but never write them.
    pub fn read_only_at(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            base_path: path.into(),
            read_only: true,
        })
    }

    /// Base directory of this store.
    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    fn objects_dir(&self) -> PathBuf {
        self.base_path.join("objects")
    }

    /// Get the path where an object would be stored.
    fn object_path(&self, hash: &ContentHash) -> PathBuf {
        self.objects_dir().join(hash.prefix()).join(hash.remainder())
    }

    /// Get the filesystem path for stored content, if present.
    pub fn path(&self, hash: &ContentHash) -> Option<PathBuf> {
        let path = self.object_path(hash);
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }
}

impl ContentStore for FileStore {
    fn put(&self, data: &[u8]) -> Result<ContentHash> {
        if self.read_only {
            anyhow::bail!("CAS is in read-only mode");
        }

        let hash = ContentHash::from_data(data);
        let obj_path = self.object_path(&hash);

        if let Some(parent) = obj_path.parent() {
            fs::create_dir_all(parent).context("failed to create object prefix directory")?;
        }

        // Skip if exists - content-addressed = idempotent
        if !obj_path.exists() {
            let tmp_path = obj_path.with_extension(format!(
                "tmp.{}.{}",
                std::process::id(),
                STAGING_SEQ.fetch_add(1, Ordering::Relaxed),
            ));
            fs::write(&tmp_path, data).context("failed to write object file")?;
            // Racing writers of the same content each rename their own
            // staging file; the renames land the same bytes either way.
            fs::rename(&tmp_path, &obj_path).context("failed to move object into place")?;
        }

        Ok(hash)
    }

    fn get(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>> {
        let path = self.object_path(hash);

        if path.exists() {
            let data = fs::read(&path).context("failed to read object file")?;
            Ok(Some(data))
        } else {
            Ok(None)
        }
    }

    fn exists(&self, hash: &ContentHash) -> bool {
        self.object_path(hash).exists()
    }

    fn len(&self) -> Result<usize> {
        let mut count = 0;
        let objects = self.objects_dir();
        if !objects.exists() {
            return Ok(0);
        }
        for shard in fs::read_dir(&objects).context("failed to read objects directory")? {
            let shard = shard?;
            if shard.file_type()?.is_dir() {
                count += fs::read_dir(shard.path())
                    .context("failed to read shard directory")?
                    .count();
            }
        }
        Ok(count)
    }
}

/// In-memory content store (HashMap-backed).
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<ContentHash, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentStore for MemoryStore {
    fn put(&self, data: &[u8]) -> Result<ContentHash> {
        let hash = ContentHash::from_data(data);
        let mut blobs = self.blobs.write().map_err(|_| anyhow::anyhow!("blob lock poisoned"))?;
        blobs.entry(hash.clone()).or_insert_with(|| data.to_vec());
        Ok(hash)
    }

    fn get(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>> {
        let blobs = self.blobs.read().map_err(|_| anyhow::anyhow!("blob lock poisoned"))?;
        Ok(blobs.get(hash).cloned())
    }

    fn exists(&self, hash: &ContentHash) -> bool {
        self.blobs
            .read()
            .map(|blobs| blobs.contains_key(hash))
            .unwrap_or(false)
    }

    fn len(&self) -> Result<usize> {
        let blobs = self.blobs.read().map_err(|_| anyhow::anyhow!("blob lock poisoned"))?;
        Ok(blobs.len())
    }
}
