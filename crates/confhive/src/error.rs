//! Domain error taxonomy for configuration operations.

use thiserror::Error;

use crate::store::StoreError;
use crate::transaction::TransactionState;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors surfaced by scope resolution, section access and transactions.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Write blocked by an ancestor Deny, a file lease, or a pending transaction.
    #[error("section is locked: {section_path}")]
    Locked {
        section_path: String,
        reason: String,
    },

    /// The referenced site, path or file no longer exists.
    #[error("scope not found: {0}")]
    ScopeNotFound(String),

    /// Unknown id or name.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate key on add.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Operation on a transaction that is no longer pending.
    #[error("transaction {id} is {state}")]
    InvalidTransactionState { id: String, state: TransactionState },

    /// Malformed payload or scope.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Store failure that has no domain meaning (parse errors, raw IO).
    #[error("storage failure: {0}")]
    Storage(String),
}

impl ConfigError {
    pub fn locked(section_path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Locked {
            section_path: section_path.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Translate a native store failure for a write or read of `section_path`.
    pub fn from_store(err: StoreError, section_path: &str) -> Self {
        match err {
            StoreError::Locked(file) => {
                Self::locked(section_path, format!("file in use: {}", file))
            }
            StoreError::Missing(file) => Self::ScopeNotFound(file),
            StoreError::InvalidPath(path) => Self::Validation(format!("invalid path: {}", path)),
            other @ (StoreError::Parse { .. } | StoreError::Io(_)) => {
                Self::Storage(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_locked_becomes_locked() {
        let err = ConfigError::from_store(
            StoreError::Locked("site/web.toml".into()),
            "site/default_document",
        );
        match err {
            ConfigError::Locked { section_path, .. } => {
                assert_eq!(section_path, "site/default_document")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_store_missing_becomes_scope_not_found() {
        let err = ConfigError::from_store(StoreError::Missing("gone/web.toml".into()), "x");
        assert!(matches!(err, ConfigError::ScopeNotFound(_)));
    }

    #[test]
    fn test_store_io_is_not_leaked_as_domain_error() {
        let io = std::io::Error::other("disk on fire");
        let err = ConfigError::from_store(StoreError::Io(io), "x");
        assert!(matches!(err, ConfigError::Storage(_)));
    }
}
