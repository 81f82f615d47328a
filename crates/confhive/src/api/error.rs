//! API error type and the mapping from domain errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::error::ConfigError;

/// API error type with structured responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Object is locked: {0}")]
    Locked(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Locked(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Locked(_) => "LOCKED",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Human readable summary, stable per variant.
    fn title(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Not found",
            Self::BadRequest(_) => "Invalid parameter",
            Self::Locked(_) => "Object is locked",
            Self::Conflict(_) => "Conflict",
            Self::Internal(_) => "Server error",
        }
    }
}

/// Structured error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub title: &'static str,
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        match &self {
            ApiError::Internal(msg) => {
                error!(error_code = code, message = %msg, "API error");
            }
            _ => {
                debug!(error_code = code, message = %message, "Client error");
            }
        }

        let body = ErrorResponse {
            title: self.title(),
            error: message,
            code,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Locked {
                section_path,
                reason,
            } => ApiError::Locked(format!("{} ({})", section_path, reason)),
            ConfigError::ScopeNotFound(msg) => ApiError::NotFound(format!("scope {}", msg)),
            ConfigError::NotFound(msg) => ApiError::NotFound(msg),
            err @ (ConfigError::AlreadyExists(_) | ConfigError::InvalidTransactionState { .. }) => {
                ApiError::Conflict(err.to_string())
            }
            ConfigError::Validation(msg) => ApiError::BadRequest(msg),
            ConfigError::Storage(msg) => ApiError::Internal(msg),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionState;

    #[test]
    fn test_config_error_mapping() {
        let locked: ApiError = ConfigError::locked("host/sites", "file in use").into();
        assert_eq!(locked.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(locked.title(), "Object is locked");

        let missing: ApiError = ConfigError::ScopeNotFound("a/web.toml".into()).into();
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let state: ApiError = ConfigError::InvalidTransactionState {
            id: "tx_1".into(),
            state: TransactionState::Committed,
        }
        .into();
        assert_eq!(state.status_code(), StatusCode::CONFLICT);

        let dup: ApiError = ConfigError::already_exists("site 'a'").into();
        assert_eq!(dup.status_code(), StatusCode::CONFLICT);

        let invalid: ApiError = ConfigError::validation("bad").into();
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

        let storage: ApiError = ConfigError::Storage("io".into()).into();
        assert_eq!(storage.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
