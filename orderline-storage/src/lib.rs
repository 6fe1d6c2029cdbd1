//! orderline Storage - Order Persistence and Caching
//!
//! The [`OrderStore`] trait is the seam between the ingestion loop, the query
//! path and the durable store. [`PgOrderStore`] is the production
//! implementation; [`MemoryOrderStore`] backs tests. [`OrderCache`] is the
//! process-wide map of recently seen orders.

use async_trait::async_trait;
use orderline_core::{Order, StorageError};

pub mod cache;
pub mod memory;
pub mod pg;

pub use cache::{CacheStats, OrderCache};
pub use memory::MemoryOrderStore;
pub use pg::{DbConfig, PgOrderStore};

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// ============================================================================
// ORDER STORE TRAIT
// ============================================================================

/// Durable storage of order records.
///
/// Implementations must be safe to call concurrently from the ingestion task
/// and from HTTP handlers.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert or fully replace an order with its delivery, payment and items.
    ///
    /// All parts are written atomically: on error nothing of this call is
    /// visible. On replace the previous item list is discarded, never merged.
    async fn upsert_order(&self, order: &Order) -> StorageResult<()>;

    /// Fetch one order by id.
    ///
    /// Returns [`StorageError::NotFound`] when no root row exists, and a
    /// persistence error when the root row exists but its delivery or payment
    /// is missing.
    async fn get_order(&self, order_uid: &str) -> StorageResult<Order>;

    /// Fetch every reconstructable order.
    ///
    /// Orders that fail reconstruction are skipped. Only a failure to list
    /// the ids at all is returned as an error.
    async fn get_all_orders(&self) -> StorageResult<Vec<Order>>;

    /// Check that the backing store is reachable.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
