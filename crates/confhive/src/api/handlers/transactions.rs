//! Transaction handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::error::ConfigError;
use crate::transaction::{TransactionState, TransactionSummary};

/// PATCH body: the requested terminal state.
#[derive(Debug, Deserialize)]
pub struct TransactionPatch {
    pub state: TransactionState,
}

/// List pending transactions.
pub async fn list_transactions(State(state): State<AppState>) -> Json<Value> {
    let transactions = state.config.transactions().list_pending().await;
    Json(json!({ "transactions": transactions }))
}

pub async fn create_transaction(
    State(state): State<AppState>,
) -> (StatusCode, Json<TransactionSummary>) {
    let summary = state.config.transactions().create();
    (StatusCode::CREATED, Json(summary))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TransactionSummary>> {
    Ok(Json(state.config.transactions().get(&id).await?))
}

/// Commit or abort a transaction.
#[instrument(skip(state))]
pub async fn patch_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<TransactionPatch>,
) -> ApiResult<Json<TransactionSummary>> {
    let summary = match patch.state {
        TransactionState::Committed => {
            // Unknown ids stay 404; anything the apply step trips over is a conflict.
            state.config.transactions().get(&id).await?;
            state
                .config
                .commit_transaction(&id)
                .await
                .map_err(commit_conflict)?
        }
        TransactionState::Aborted => state.config.abort_transaction(&id).await?,
        TransactionState::Pending => {
            return Err(ApiError::bad_request(
                "state must be 'committed' or 'aborted'",
            ));
        }
    };
    Ok(Json(summary))
}

/// Errors raised while applying a staged set mean the live store moved
/// underneath the transaction.
fn commit_conflict(err: ConfigError) -> ApiError {
    match err {
        ConfigError::Locked { .. } | ConfigError::ScopeNotFound(_) | ConfigError::NotFound(_) => {
            ApiError::conflict(format!("commit failed: {}", err))
        }
        other => other.into(),
    }
}
