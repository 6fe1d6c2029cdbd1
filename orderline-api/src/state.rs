//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use orderline_storage::{OrderCache, OrderStore};

use crate::jobs::IngestMetrics;
use crate::services::OrderQuery;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Read-through lookups for the order endpoints.
    pub query: OrderQuery,
    /// Durable store, probed by the readiness check.
    pub store: Arc<dyn OrderStore>,
    pub cache: Arc<OrderCache>,
    /// Counters of the ingestion loop running in this process.
    pub ingest_metrics: Arc<IngestMetrics>,
    pub start_time: Instant,
}

impl AppState {
    /// Build the state around one store and one cache, shared with the
    /// ingestion loop.
    pub fn new(
        store: Arc<dyn OrderStore>,
        cache: Arc<OrderCache>,
        ingest_metrics: Arc<IngestMetrics>,
    ) -> Self {
        Self {
            query: OrderQuery::new(Arc::clone(&store), Arc::clone(&cache)),
            store,
            cache,
            ingest_metrics,
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(OrderQuery, query);
crate::impl_from_ref!(Arc<dyn OrderStore>, store);
crate::impl_from_ref!(Arc<OrderCache>, cache);
crate::impl_from_ref!(Arc<IngestMetrics>, ingest_metrics);
