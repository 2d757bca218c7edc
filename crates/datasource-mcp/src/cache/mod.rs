//! Tiered in-memory caching for query results and schema snapshots
//!
//! # Tiers
//!
//! - [`CacheTier::Query`] - serialized query results, keyed by
//!   [`CacheKey::query_result`]
//! - [`CacheTier::Schema`] - serialized schema snapshots
//! - [`CacheTier::Metadata`] - schema fingerprints used to detect changes
//!
//! Each tier is an independent [`TtlCache`] with its own capacity and default
//! TTL. [`CacheManager`] owns the tiers and keeps per-tier hit/miss counters.
//!
//! # Consistency
//!
//! The cache is local to one process. Entries are never refreshed in the
//! background; a value is served until its TTL runs out or it is evicted.

mod config;
mod engine;
mod key;
mod manager;

pub use config::{CacheConfig, CacheTier, TierConfig};
pub use engine::TtlCache;
pub use key::{CacheKey, CacheNamespace, normalize_statement};
pub use manager::{CacheManager, CacheStats, TierStats};
