//! In-process order cache.
//!
//! Every order the ingestion loop persists is written here, and the query
//! path serves from here before touching the store. There is no eviction and
//! no TTL: the map grows with the set of orders seen by this process.
//!
//! # Write rules
//!
//! Two writers race on the same key: ingestion, which always holds the newest
//! record, and the query path or warm-up, which back-fill from the store and
//! may hold an older one. Ingestion uses [`OrderCache::set`] and overwrites
//! unconditionally. Back-fills use [`OrderCache::fill`], which only inserts
//! into a vacant slot, so a slow back-fill can never replace a newer record.

pub mod order_cache;
pub mod stats;

pub use order_cache::OrderCache;
pub use stats::CacheStats;
