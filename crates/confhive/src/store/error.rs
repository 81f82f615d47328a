//! Native store error types.

use thiserror::Error;

/// Result type for native store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reported by the file-backed store.
///
/// The set is closed on purpose: callers above the section accessor only
/// ever see these tags translated into the domain taxonomy.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The file is held by another writer.
    #[error("file in use: {0}")]
    Locked(String),

    /// The file or its containing directory does not exist.
    #[error("missing: {0}")]
    Missing(String),

    /// The file exists but is not a valid level document.
    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    /// Path escapes the store root or is otherwise malformed.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn parse(path: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::Locked("sites/a/web.toml".to_string());
        assert_eq!(err.to_string(), "file in use: sites/a/web.toml");

        let err = StoreError::parse("host.toml", "expected table");
        assert_eq!(err.to_string(), "parse error in host.toml: expected table");
    }
}
