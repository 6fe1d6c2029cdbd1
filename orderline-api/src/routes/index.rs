//! Landing page.

use axum::response::Html;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// GET / - Static page with an order lookup form
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
