//! Applying staged mutations to the live store, all or nothing.
//!
//! The store only replaces single files. A commit leases every file it
//! touches, snapshots each file's original content the first time it is
//! leased, and on any failure writes the snapshots back in reverse order.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::ClaimTable;
use crate::error::ConfigResult;
use crate::section::{MutationSet, SectionAccessor};
use crate::store::{ConfigStore, StoreResult, WriteLease};

struct JournalEntry {
    lease: WriteLease,
    original: Option<String>,
}

/// Leases and original contents of the files touched by one commit.
#[derive(Default)]
pub struct WriteJournal {
    entries: Vec<JournalEntry>,
}

impl WriteJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lease `file` unless this journal already holds it.
    pub async fn lease(&mut self, store: &dyn ConfigStore, file: &str) -> StoreResult<&WriteLease> {
        if let Some(pos) = self.entries.iter().position(|e| e.lease.file() == file) {
            return Ok(&self.entries[pos].lease);
        }

        let lease = store.acquire(file).await?;
        let original = store.read(file).await?;
        self.entries.push(JournalEntry { lease, original });
        let last = self.entries.len() - 1;
        Ok(&self.entries[last].lease)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Restore every snapshot, newest first, then release the leases.
    pub async fn rollback(self, store: &dyn ConfigStore) {
        for entry in self.entries.into_iter().rev() {
            let result = match &entry.original {
                Some(content) => store.write(&entry.lease, content).await,
                None => store.remove(&entry.lease).await,
            };
            if let Err(e) = result {
                warn!(file = entry.lease.file(), "Rollback failed to restore file: {}", e);
            }
        }
    }
}

/// Applies a whole mutation set to the live store.
pub struct CommitCoordinator {
    accessor: Arc<SectionAccessor>,
    claims: Arc<ClaimTable>,
}

impl CommitCoordinator {
    pub fn new(accessor: Arc<SectionAccessor>, claims: Arc<ClaimTable>) -> Self {
        Self { accessor, claims }
    }

    /// Apply `mutations` in staging order. `owner` is the committing
    /// transaction, whose own claims do not block it.
    ///
    /// Each mutation is re-validated against the live store right before it
    /// is applied. The first failure rolls back everything this call wrote.
    #[instrument(skip(self, mutations), fields(count = mutations.len()))]
    pub async fn apply(&self, mutations: &MutationSet, owner: Option<&str>) -> ConfigResult<()> {
        for staged in mutations.iter() {
            self.claims.check(staged, owner)?;
        }

        let store = self.accessor.store();
        let mut journal = WriteJournal::new();
        for staged in mutations.iter() {
            if let Err(e) = self.accessor.apply_in_journal(staged, &mut journal).await {
                warn!(section = %staged.section_path(), "Commit failed, rolling back: {}", e);
                journal.rollback(store).await;
                return Err(e);
            }
        }

        info!(files = journal.len(), "Committed mutation set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::scope::{Scope, ScopeResolver};
    use crate::section::{SectionMutation, SectionRegistry, StagedMutation};
    use crate::store::{LocalStore, StoreError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Local store whose Nth write fails.
    struct FailingStore {
        inner: LocalStore,
        writes: AtomicUsize,
        fail_on: usize,
    }

    #[async_trait]
    impl ConfigStore for FailingStore {
        async fn read(&self, file: &str) -> StoreResult<Option<String>> {
            self.inner.read(file).await
        }

        async fn acquire(&self, file: &str) -> StoreResult<WriteLease> {
            self.inner.acquire(file).await
        }

        async fn write(&self, lease: &WriteLease, content: &str) -> StoreResult<()> {
            let n = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.fail_on {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.inner.write(lease, content).await
        }

        async fn remove(&self, lease: &WriteLease) -> StoreResult<()> {
            self.inner.remove(lease).await
        }

        async fn create_dir(&self, dir: &str) -> StoreResult<()> {
            self.inner.create_dir(dir).await
        }
    }

    const HOST: &str = r#"
[sections.sites]
entries = [{ id = 1, name = "shop", physical_path = "shop" }]

[sections.default_document]
files = ["home.html"]
"#;

    fn setup(fail_on: usize) -> (tempfile::TempDir, CommitCoordinator, Arc<SectionAccessor>) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("shop")).unwrap();
        std::fs::write(dir.path().join("host.toml"), HOST).unwrap();

        let store = FailingStore {
            inner: LocalStore::new(dir.path()),
            writes: AtomicUsize::new(0),
            fail_on,
        };
        let accessor = Arc::new(SectionAccessor::new(
            Arc::new(store),
            Arc::new(SectionRegistry::builtin()),
            ScopeResolver::default(),
        ));
        let coordinator = CommitCoordinator::new(accessor.clone(), Arc::new(ClaimTable::new()));
        (dir, coordinator, accessor)
    }

    async fn stage(
        accessor: &SectionAccessor,
        set: &mut MutationSet,
        scope: Scope,
        name: &str,
        mutation: SectionMutation,
    ) {
        let target = accessor
            .check_write(&scope, name, &mutation, Some(set))
            .await
            .unwrap();
        set.stage(StagedMutation::new(scope, &target, name, mutation));
    }

    async fn two_file_set(accessor: &SectionAccessor) -> MutationSet {
        let mut set = MutationSet::new();
        stage(
            accessor,
            &mut set,
            Scope::global(),
            "default_document",
            SectionMutation::replace(json!({"files": ["changed.html"]})),
        )
        .await;
        stage(
            accessor,
            &mut set,
            Scope::site(1, "/").unwrap(),
            "directory_browse",
            SectionMutation::replace(json!({"enabled": true})),
        )
        .await;
        set
    }

    #[tokio::test]
    async fn test_commit_applies_in_order() {
        let (dir, coordinator, accessor) = setup(0);
        let set = two_file_set(&accessor).await;

        coordinator.apply(&set, None).await.unwrap();

        let host = accessor
            .get_section(&Scope::global(), "default_document", None)
            .await
            .unwrap();
        assert_eq!(host.value, json!({"files": ["changed.html"]}));
        assert!(dir.path().join("shop/web.toml").exists());
        assert!(!dir.path().join("host.toml.lock").exists());
        assert!(!dir.path().join("shop/web.toml.lock").exists());
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back_earlier_writes() {
        let (dir, coordinator, accessor) = setup(2);
        let before = std::fs::read_to_string(dir.path().join("host.toml")).unwrap();
        let set = two_file_set(&accessor).await;

        let err = coordinator.apply(&set, None).await.unwrap_err();
        assert!(matches!(err, ConfigError::Storage(_)));

        let after = std::fs::read_to_string(dir.path().join("host.toml")).unwrap();
        assert_eq!(before, after);
        assert!(!dir.path().join("shop/web.toml").exists());
        assert!(!dir.path().join("host.toml.lock").exists());
    }

    #[tokio::test]
    async fn test_commit_revalidates_against_live_store() {
        let (_dir, coordinator, accessor) = setup(0);
        let set = two_file_set(&accessor).await;

        accessor
            .set_section(
                &Scope::global(),
                "directory_browse",
                SectionMutation::override_mode(crate::scope::OverrideMode::Deny),
            )
            .await
            .unwrap();

        let err = coordinator.apply(&set, None).await.unwrap_err();
        assert!(matches!(err, ConfigError::Locked { .. }));

        let host = accessor
            .get_section(&Scope::global(), "default_document", None)
            .await
            .unwrap();
        assert_eq!(host.value, json!({"files": ["home.html"]}));
    }

    #[tokio::test]
    async fn test_claimed_key_blocks_other_committers() {
        let (_dir, coordinator, accessor) = setup(0);
        let set = two_file_set(&accessor).await;
        let first = set.iter().next().unwrap().clone();
        coordinator.claims.claim(&first, "tx_other").unwrap();

        let err = coordinator.apply(&set, None).await.unwrap_err();
        assert!(matches!(err, ConfigError::Locked { .. }));
        coordinator.apply(&set, Some("tx_other")).await.unwrap();
    }
}
