//! HTTP Routes Module
//!
//! - `/` informational page
//! - `/order/{id}` and `/api/order/{id}` order lookups; trailing segments are ignored
//! - `/health/*` liveness and readiness checks
//!
//! There are no write endpoints; orders arrive only through the stream.

pub mod health;
pub mod index;
pub mod order;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index::index))
        .merge(order::create_router())
        .nest("/health", health::create_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
