//! In-memory registry of transactions and their staged mutations.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, instrument};

use super::{ClaimTable, CommitCoordinator, Transaction, TransactionState, TransactionSummary};
use crate::error::{ConfigError, ConfigResult};
use crate::section::{MutationSet, StagedMutation};

/// Default idle timeout for pending transactions.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(900);

/// Owns every transaction known to this process.
///
/// Each transaction sits behind its own mutex so a commit holds it for the
/// whole apply; an abort arriving meanwhile waits and then sees a terminal
/// state.
pub struct TransactionStore {
    transactions: DashMap<String, Arc<Mutex<Transaction>>>,
    claims: Arc<ClaimTable>,
    idle_timeout: Duration,
}

impl TransactionStore {
    pub fn new(claims: Arc<ClaimTable>, idle_timeout: Duration) -> Self {
        Self {
            transactions: DashMap::new(),
            claims,
            idle_timeout,
        }
    }

    pub fn claims(&self) -> &ClaimTable {
        &self.claims
    }

    fn entry(&self, id: &str) -> ConfigResult<Arc<Mutex<Transaction>>> {
        self.transactions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ConfigError::not_found(format!("transaction {}", id)))
    }

    fn ensure_pending(tx: &Transaction) -> ConfigResult<()> {
        if tx.is_pending() {
            Ok(())
        } else {
            Err(ConfigError::InvalidTransactionState {
                id: tx.id.clone(),
                state: tx.state,
            })
        }
    }

    pub fn create(&self) -> TransactionSummary {
        let tx = Transaction::new();
        let summary = tx.summary();
        info!(transaction = %tx.id, "Created transaction");
        self.transactions
            .insert(tx.id.clone(), Arc::new(Mutex::new(tx)));
        summary
    }

    pub async fn get(&self, id: &str) -> ConfigResult<TransactionSummary> {
        let entry = self.entry(id)?;
        let tx = entry.lock().await;
        Ok(tx.summary())
    }

    /// Pending transactions, oldest first.
    pub async fn list_pending(&self) -> Vec<TransactionSummary> {
        let entries: Vec<_> = self
            .transactions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut pending = Vec::new();
        for entry in entries {
            let tx = entry.lock().await;
            if tx.is_pending() {
                pending.push(tx.summary());
            }
        }
        pending.sort_by_key(|s| s.created_at);
        pending
    }

    /// Copy of the staged set, for read-through and merging. Counts as activity.
    pub async fn snapshot(&self, id: &str) -> ConfigResult<MutationSet> {
        let entry = self.entry(id)?;
        let mut tx = entry.lock().await;
        Self::ensure_pending(&tx)?;
        tx.touch();
        Ok(tx.mutations.clone())
    }

    /// Stage a mutation. A key staged before is merged in place under the
    /// transaction lock, so concurrent requests in one transaction never
    /// drop each other's fields.
    pub async fn stage(&self, id: &str, staged: StagedMutation) -> ConfigResult<()> {
        let entry = self.entry(id)?;
        let mut tx = entry.lock().await;
        Self::ensure_pending(&tx)?;
        self.claims.claim(&staged, id)?;

        debug!(transaction = id, section = %staged.section_path(), "Staged mutation");
        tx.mutations.stage(staged);
        tx.touch();
        Ok(())
    }

    /// Apply the staged set through `coordinator`. On failure nothing is
    /// left applied and the transaction stays pending.
    #[instrument(skip(self, coordinator))]
    pub async fn commit(
        &self,
        id: &str,
        coordinator: &CommitCoordinator,
    ) -> ConfigResult<TransactionSummary> {
        let entry = self.entry(id)?;
        let mut tx = entry.lock().await;
        Self::ensure_pending(&tx)?;

        coordinator.apply(&tx.mutations, Some(id)).await?;

        tx.state = TransactionState::Committed;
        tx.touch();
        self.claims.release(id);
        info!(transaction = id, staged = tx.mutations.len(), "Committed transaction");
        Ok(tx.summary())
    }

    pub async fn abort(&self, id: &str) -> ConfigResult<TransactionSummary> {
        let entry = self.entry(id)?;
        let mut tx = entry.lock().await;
        Self::ensure_pending(&tx)?;
        Self::finish_aborted(&mut tx, &self.claims);
        info!(transaction = id, "Aborted transaction");
        Ok(tx.summary())
    }

    fn finish_aborted(tx: &mut Transaction, claims: &ClaimTable) {
        tx.state = TransactionState::Aborted;
        tx.mutations.clear();
        tx.touch();
        claims.release(&tx.id);
    }

    /// Abort pending transactions idle past the timeout and forget terminal
    /// ones that finished longer ago than the timeout. Returns how many
    /// transactions were aborted.
    ///
    /// Transactions busy in another call are skipped until the next sweep.
    pub fn sweep_expired(&self) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(self.idle_timeout)
            .ok()
            .and_then(|timeout| Utc::now().checked_sub_signed(timeout))
        else {
            return 0;
        };
        let mut aborted = 0;

        self.transactions.retain(|id, entry| {
            let Ok(mut tx) = entry.try_lock() else {
                return true;
            };
            if tx.last_activity > cutoff {
                return true;
            }
            if tx.is_pending() {
                Self::finish_aborted(&mut tx, &self.claims);
                aborted += 1;
                info!(transaction = %id, "Expired idle transaction");
                return true;
            }
            false
        });

        aborted
    }

    /// Run `sweep_expired` every `every` until the runtime shuts down.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(every);
            loop {
                ticker.tick().await;
                let aborted = self.sweep_expired();
                if aborted > 0 {
                    debug!(aborted, "Transaction sweep finished");
                }
            }
        })
    }
}

impl Default for TransactionStore {
    fn default() -> Self {
        Self::new(Arc::new(ClaimTable::new()), DEFAULT_IDLE_TIMEOUT)
    }
}
