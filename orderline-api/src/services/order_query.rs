//! Read-through order lookup.

use orderline_core::Order;
use orderline_storage::{OrderCache, OrderStore, StorageResult};
use std::sync::Arc;

/// Answers order lookups from the cache, falling back to the store.
///
/// A store hit is back-filled into the cache only when the slot is still
/// vacant, so a fresher order written by ingestion in the meantime is never
/// overwritten by this read. Lookups are not retried.
#[derive(Clone)]
pub struct OrderQuery {
    store: Arc<dyn OrderStore>,
    cache: Arc<OrderCache>,
}

impl OrderQuery {
    pub fn new(store: Arc<dyn OrderStore>, cache: Arc<OrderCache>) -> Self {
        Self { store, cache }
    }

    /// Look up one order by id.
    pub async fn get_by_id(&self, order_uid: &str) -> StorageResult<Order> {
        if let Some(order) = self.cache.get(order_uid) {
            return Ok(order);
        }
        tracing::debug!(order_uid, "Cache miss, reading from store");

        let order = self.store.get_order(order_uid).await?;
        if !self.cache.fill(order.clone()) {
            tracing::debug!(order_uid, "Cache already filled, keeping newer entry");
        }
        Ok(order)
    }
}
