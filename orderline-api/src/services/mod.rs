//! Service Layer
//!
//! Read-side logic shared by the HTTP handlers, kept free of axum types.

mod order_query;

pub use order_query::*;
