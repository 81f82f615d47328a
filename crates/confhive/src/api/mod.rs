//! HTTP API module.
//!
//! REST endpoints for sections, sites and transactions. Every route accepts
//! a `Transaction-Id` header that binds the request to a pending transaction.

mod error;
mod extract;
pub mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use extract::{TRANSACTION_HEADER, Unit};
pub use routes::create_router;
pub use state::AppState;
