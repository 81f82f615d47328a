//! Staged transactions: isolation in memory, atomicity at commit.

mod claims;
mod commit;
mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::section::MutationSet;

pub use claims::ClaimTable;
pub use commit::{CommitCoordinator, WriteJournal};
pub use store::TransactionStore;

/// Lifecycle state. Committed and Aborted are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    Pending,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named batch of staged section mutations.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: String,
    pub state: TransactionState,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub mutations: MutationSet,
}

impl Transaction {
    pub(crate) fn new() -> Self {
        let now = Utc::now();
        Self {
            id: format!("tx_{}", nanoid::nanoid!(12)),
            state: TransactionState::Pending,
            created_at: now,
            last_activity: now,
            mutations: MutationSet::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == TransactionState::Pending
    }

    pub(crate) fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn summary(&self) -> TransactionSummary {
        TransactionSummary {
            id: self.id.clone(),
            state: self.state,
            created_at: self.created_at,
            last_activity: self.last_activity,
            staged: self.mutations.len(),
        }
    }
}

/// API view of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub id: String,
    pub state: TransactionState,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Number of staged (level file, section) keys.
    pub staged: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transaction_is_pending() {
        let tx = Transaction::new();
        assert!(tx.id.starts_with("tx_"));
        assert!(tx.is_pending());
        assert_eq!(tx.summary().staged, 0);
    }

    #[test]
    fn test_state_serde() {
        assert_eq!(
            serde_json::to_string(&TransactionState::Committed).unwrap(),
            "\"committed\""
        );
        let state: TransactionState = serde_json::from_str("\"aborted\"").unwrap();
        assert!(state.is_terminal());
        assert_eq!(TransactionState::Pending.to_string(), "pending");
    }
}
