//! API route definitions.

use axum::Router;
use axum::http::{HeaderName, Method, header};
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::extract::TRANSACTION_HEADER;
use super::handlers;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(TRANSACTION_HEADER),
        ]);

    let api = Router::new()
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route(
            "/transactions/{id}",
            get(handlers::get_transaction).patch(handlers::patch_transaction),
        )
        .route("/sections", get(handlers::list_sections))
        .route(
            "/sections/{name}",
            get(handlers::get_section)
                .patch(handlers::patch_section)
                .delete(handlers::delete_section),
        )
        .route(
            "/sites",
            get(handlers::list_sites).post(handlers::create_site),
        )
        .route(
            "/sites/{id}",
            get(handlers::get_site)
                .patch(handlers::patch_site)
                .delete(handlers::delete_site),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
