//! Order lookup endpoints.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::services::OrderQuery;
use crate::state::AppState;

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /order/{id} and /api/order/{id} - Fetch one order
///
/// The id is taken verbatim; a blank id is looked up like any other and ends
/// in 404.
pub async fn get_order(
    State(query): State<OrderQuery>,
    Path(order_uid): Path<String>,
) -> ApiResult<Response> {
    let order = query.get_by_id(&order_uid).await?;
    pretty_json(&order)
}

/// GET /order/{id}/... - Segments after the id are ignored
pub async fn get_order_with_suffix(
    query: State<OrderQuery>,
    Path((order_uid, _rest)): Path<(String, String)>,
) -> ApiResult<Response> {
    get_order(query, Path(order_uid)).await
}

/// GET /order/ without an id
pub async fn missing_order_id() -> ApiError {
    missing_id()
}

fn missing_id() -> ApiError {
    ApiError::missing_field("order id")
}

/// Render `value` as indented JSON.
fn pretty_json<T: Serialize>(value: &T) -> ApiResult<Response> {
    let body = serde_json::to_vec_pretty(value)
        .map_err(|e| ApiError::internal_error(format!("Failed to encode response: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/order/", get(missing_order_id))
        .route("/order/:id", get(get_order))
        .route("/order/:id/*rest", get(get_order_with_suffix))
        .route("/api/order/", get(missing_order_id))
        .route("/api/order/:id", get(get_order))
        .route("/api/order/:id/*rest", get(get_order_with_suffix))
}
