//! Local filesystem store implementation.

use async_trait::async_trait;
use log::debug;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use super::{ConfigStore, StoreError, StoreResult, WriteLease};

/// Level files on the local filesystem, rooted at one directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    /// Base directory for storage.
    base_path: PathBuf,
}

impl LocalStore {
    /// Create a new local store instance.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Get the full path for a store path, rejecting anything that escapes the root.
    fn full_path(&self, path: &str) -> StoreResult<PathBuf> {
        let relative = Path::new(normalize_path(path));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        Ok(self.base_path.join(relative))
    }
}

/// Normalize a path by removing leading slashes.
fn normalize_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Sibling path with an extra extension, e.g. `web.toml` -> `web.toml.lock`.
fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(OsString::new);
    name.push(suffix);
    path.with_file_name(name)
}

fn map_missing(path: &str, e: std::io::Error) -> StoreError {
    if e.kind() == ErrorKind::NotFound {
        StoreError::Missing(path.to_string())
    } else {
        StoreError::Io(e)
    }
}

#[async_trait]
impl ConfigStore for LocalStore {
    async fn read(&self, file: &str) -> StoreResult<Option<String>> {
        let full_path = self.full_path(file)?;
        match fs::read_to_string(&full_path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn acquire(&self, file: &str) -> StoreResult<WriteLease> {
        let full_path = self.full_path(file)?;
        let lock_path = sibling_with_suffix(&full_path, ".lock");

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .await
        {
            Ok(_) => {
                debug!("Acquired lease on {}", full_path.display());
                Ok(WriteLease::new(file, lock_path))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::Locked(file.to_string()))
            }
            Err(e) => Err(map_missing(file, e)),
        }
    }

    async fn write(&self, lease: &WriteLease, content: &str) -> StoreResult<()> {
        let full_path = self.full_path(lease.file())?;
        let tmp_path = sibling_with_suffix(&full_path, ".tmp");

        fs::write(&tmp_path, content)
            .await
            .map_err(|e| map_missing(lease.file(), e))?;
        if let Err(e) = fs::rename(&tmp_path, &full_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(map_missing(lease.file(), e));
        }

        debug!("Wrote {} bytes to {}", content.len(), full_path.display());
        Ok(())
    }

    async fn remove(&self, lease: &WriteLease) -> StoreResult<()> {
        let full_path = self.full_path(lease.file())?;
        match fs::remove_file(&full_path).await {
            Ok(()) => {
                debug!("Deleted {}", full_path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn create_dir(&self, dir: &str) -> StoreResult<()> {
        let full_path = self.full_path(dir)?;
        fs::create_dir_all(&full_path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        assert!(store.read("host.toml").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let lease = store.acquire("host.toml").await.unwrap();
        store.write(&lease, "[sections]\n").await.unwrap();
        drop(lease);

        let content = store.read("host.toml").await.unwrap();
        assert_eq!(content.as_deref(), Some("[sections]\n"));
        assert!(!dir.path().join("host.toml.lock").exists());
    }

    #[tokio::test]
    async fn test_second_lease_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let _held = store.acquire("host.toml").await.unwrap();
        let err = store.acquire("host.toml").await.unwrap_err();
        assert!(matches!(err, StoreError::Locked(_)));
    }

    #[tokio::test]
    async fn test_lease_in_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let err = store.acquire("sites/gone/web.toml").await.unwrap_err();
        assert!(matches!(err, StoreError::Missing(_)));
    }

    #[tokio::test]
    async fn test_rejects_parent_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let err = store.read("../outside.toml").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let lease = store.acquire("host.toml").await.unwrap();
        store.remove(&lease).await.unwrap();
    }
}
