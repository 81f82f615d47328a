//! Shared configuration core, cloned into every request.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigResult;
use crate::scope::ScopeResolver;
use crate::section::{SectionAccessor, SectionRegistry};
use crate::store::{ConfigStore, LocalStore};
use crate::transaction::{ClaimTable, CommitCoordinator, TransactionStore, TransactionSummary};
use crate::unit::ManagementUnit;

/// Accessor, transaction registry and commit coordinator over one store.
#[derive(Clone)]
pub struct ConfigService {
    accessor: Arc<SectionAccessor>,
    transactions: Arc<TransactionStore>,
    coordinator: Arc<CommitCoordinator>,
}

impl ConfigService {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        registry: SectionRegistry,
        idle_timeout: Duration,
    ) -> Self {
        let claims = Arc::new(ClaimTable::new());
        let accessor = Arc::new(SectionAccessor::new(
            store,
            Arc::new(registry),
            ScopeResolver::default(),
        ));
        let coordinator = Arc::new(CommitCoordinator::new(
            Arc::clone(&accessor),
            Arc::clone(&claims),
        ));
        let transactions = Arc::new(TransactionStore::new(claims, idle_timeout));

        Self {
            accessor,
            transactions,
            coordinator,
        }
    }

    /// Service over a directory tree with the built-in sections.
    pub fn local(root: impl Into<PathBuf>, idle_timeout: Duration) -> Self {
        Self::new(
            Arc::new(LocalStore::new(root)),
            SectionRegistry::builtin(),
            idle_timeout,
        )
    }

    pub fn accessor(&self) -> &SectionAccessor {
        &self.accessor
    }

    pub fn transactions(&self) -> &Arc<TransactionStore> {
        &self.transactions
    }

    pub fn coordinator(&self) -> &CommitCoordinator {
        &self.coordinator
    }

    /// Unit of work for one request; `Some(id)` binds it to a transaction.
    pub fn unit(&self, transaction_id: Option<String>) -> ManagementUnit {
        ManagementUnit::new(self.clone(), transaction_id)
    }

    pub async fn commit_transaction(&self, id: &str) -> ConfigResult<TransactionSummary> {
        self.transactions.commit(id, &self.coordinator).await
    }

    pub async fn abort_transaction(&self, id: &str) -> ConfigResult<TransactionSummary> {
        self.transactions.abort(id).await
    }
}
