//! Concurrent map from order id to the latest known order record.

use super::CacheStats;
use crate::{OrderStore, StorageResult};
use orderline_core::Order;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

/// Process-wide order cache.
///
/// Many readers proceed in parallel; writers take the map exclusively for the
/// duration of a single insert. Values are whole records replaced atomically,
/// so a poisoned lock still guards a consistent map and is recovered rather
/// than propagated.
#[derive(Debug, Default)]
pub struct OrderCache {
    entries: RwLock<HashMap<String, Order>>,
    hits: AtomicU64,
    misses: AtomicU64,
    fills: AtomicU64,
    fills_skipped: AtomicU64,
}

impl OrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Order>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Order>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up an order by id.
    pub fn get(&self, order_uid: &str) -> Option<Order> {
        let found = self.read().get(order_uid).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Insert or replace the entry for `order.order_uid`.
    ///
    /// Used by ingestion after a successful persist.
    pub fn set(&self, order: Order) {
        self.write().insert(order.order_uid.clone(), order);
    }

    /// Insert `order` only if no entry exists for its id.
    ///
    /// Returns `true` when the entry was inserted. Used by back-fills so that
    /// a record read from the store never overwrites one set by ingestion.
    pub fn fill(&self, order: Order) -> bool {
        let inserted = {
            let mut entries = self.write();
            match entries.entry(order.order_uid.clone()) {
                std::collections::hash_map::Entry::Occupied(_) => false,
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(order);
                    true
                }
            }
        };
        if inserted {
            self.fills.fetch_add(1, Ordering::Relaxed);
        } else {
            self.fills_skipped.fetch_add(1, Ordering::Relaxed);
        }
        inserted
    }

    /// Number of cached orders.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load every order from `store` into the cache.
    ///
    /// Entries already present are kept. Returns how many orders were
    /// inserted. A failure to list orders leaves the cache untouched.
    pub async fn warm_up(&self, store: &dyn OrderStore) -> StorageResult<usize> {
        let orders = store.get_all_orders().await?;
        let total = orders.len();
        let inserted = orders
            .into_iter()
            .map(|order| self.fill(order))
            .filter(|&inserted| inserted)
            .count();
        info!(loaded = total, inserted, "Order cache warmed up");
        Ok(inserted)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.len() as u64,
            fills: self.fills.load(Ordering::Relaxed),
            fills_skipped: self.fills_skipped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryOrderStore;
    use orderline_core::Payment;
    use std::sync::Arc;

    fn order(uid: &str, track: &str) -> Order {
        Order {
            order_uid: uid.to_string(),
            track_number: track.to_string(),
            payment: Payment {
                transaction: uid.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_get_on_empty_cache_misses() {
        let cache = OrderCache::new();
        assert_eq!(cache.get("x"), None);
        assert_eq!(cache.stats().misses, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_overwrites() {
        let cache = OrderCache::new();
        cache.set(order("o1", "old"));
        cache.set(order("o1", "new"));
        assert_eq!(cache.get("o1").unwrap().track_number, "new");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_fill_never_overwrites() {
        let cache = OrderCache::new();
        cache.set(order("o1", "from-ingest"));
        assert!(!cache.fill(order("o1", "from-store")));
        assert_eq!(cache.get("o1").unwrap().track_number, "from-ingest");

        assert!(cache.fill(order("o2", "from-store")));
        let stats = cache.stats();
        assert_eq!(stats.fills, 1);
        assert_eq!(stats.fills_skipped, 1);
        assert_eq!(stats.entry_count, 2);
    }

    #[tokio::test]
    async fn test_warm_up_loads_store_contents() {
        let store = MemoryOrderStore::with_orders([order("a", "1"), order("b", "2")]);
        let cache = OrderCache::new();
        cache.set(order("a", "newer"));

        let inserted = cache.warm_up(&store).await.unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").unwrap().track_number, "newer");
    }

    #[tokio::test]
    async fn test_warm_up_failure_leaves_cache_untouched() {
        let store = MemoryOrderStore::with_orders([order("a", "1")]);
        store.set_unavailable(true);
        let cache = OrderCache::new();

        assert!(cache.warm_up(&store).await.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let cache = Arc::new(OrderCache::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let uid = format!("o{}", i % 20);
                        if t % 2 == 0 {
                            cache.set(order(&uid, &format!("t{}", t)));
                        } else if let Some(found) = cache.get(&uid) {
                            assert_eq!(found.order_uid, uid);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 20);
    }
}
