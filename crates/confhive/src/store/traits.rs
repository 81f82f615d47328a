//! Store trait definitions.

use async_trait::async_trait;
use std::path::PathBuf;

use super::StoreResult;

/// Exclusive right to rewrite one level file.
///
/// Dropping the lease releases the lock.
#[derive(Debug)]
pub struct WriteLease {
    file: String,
    lock_path: PathBuf,
}

impl WriteLease {
    pub(crate) fn new(file: impl Into<String>, lock_path: PathBuf) -> Self {
        Self {
            file: file.into(),
            lock_path,
        }
    }

    /// Store-relative path of the leased file.
    pub fn file(&self) -> &str {
        &self.file
    }
}

impl Drop for WriteLease {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            log::warn!("failed to release lease {}: {}", self.lock_path.display(), e);
        }
    }
}

/// Backing store for level files.
///
/// Paths are store-relative, `/`-separated strings. The store has no
/// multi-file transaction primitive; callers that need atomicity across
/// files build it on top of leases and snapshots.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read a file. A missing file yields `None`.
    async fn read(&self, file: &str) -> StoreResult<Option<String>>;

    /// Acquire the write lease for a file.
    ///
    /// Fails with `Locked` when another writer holds it and with `Missing`
    /// when the containing directory does not exist.
    async fn acquire(&self, file: &str) -> StoreResult<WriteLease>;

    /// Replace the whole file under a lease.
    async fn write(&self, lease: &WriteLease, content: &str) -> StoreResult<()>;

    /// Remove the file under a lease. Removing a missing file is not an error.
    async fn remove(&self, lease: &WriteLease) -> StoreResult<()>;

    /// Create a directory and its parents.
    async fn create_dir(&self, dir: &str) -> StoreResult<()>;
}
