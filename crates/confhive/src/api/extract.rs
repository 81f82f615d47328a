//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::error::ApiError;
use super::state::AppState;
use crate::unit::ManagementUnit;

/// Header binding a request to a pending transaction.
pub const TRANSACTION_HEADER: &str = "transaction-id";

/// The request's unit of work, bound to the `Transaction-Id` header if sent.
pub struct Unit(pub ManagementUnit);

impl FromRequestParts<AppState> for Unit {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let transaction_id = match parts.headers.get(TRANSACTION_HEADER) {
            Some(value) => {
                let id = value
                    .to_str()
                    .map_err(|_| ApiError::bad_request("Transaction-Id header is not valid text"))?
                    .trim();
                (!id.is_empty()).then(|| id.to_string())
            }
            None => None,
        };
        Ok(Unit(state.config.unit(transaction_id)))
    }
}
