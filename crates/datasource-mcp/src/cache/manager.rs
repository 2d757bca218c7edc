//! Tiered cache manager with hit/miss accounting

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use super::config::{CacheConfig, CacheTier};
use super::engine::TtlCache;
use crate::Result;

#[derive(Default)]
struct TierCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

struct Tier {
    cache: TtlCache<String>,
    counters: TierCounters,
}

/// Per-tier statistics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

/// Aggregate statistics snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub tiers: BTreeMap<String, TierStats>,
    pub total_hits: u64,
    pub total_misses: u64,
    pub total_requests: u64,
    pub hit_rate_percent: f64,
}

/// Owns one [`TtlCache`] per [`CacheTier`] and counts lookups.
///
/// Values are serialized payloads; callers encode and decode them.
pub struct CacheManager {
    query: Tier,
    schema: Tier,
    metadata: Tier,
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("query", &self.query.cache)
            .field("schema", &self.schema.cache)
            .field("metadata", &self.metadata.cache)
            .finish()
    }
}

impl CacheManager {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        let tier = |tier: CacheTier| Tier {
            cache: TtlCache::from_config(config.tier(tier)),
            counters: TierCounters::default(),
        };

        Self {
            query: tier(CacheTier::Query),
            schema: tier(CacheTier::Schema),
            metadata: tier(CacheTier::Metadata),
        }
    }

    /// Resolve a tier by name, failing on unknown names
    pub fn tier_from_name(name: &str) -> Result<CacheTier> {
        name.parse()
    }

    const fn tier(&self, tier: CacheTier) -> &Tier {
        match tier {
            CacheTier::Query => &self.query,
            CacheTier::Schema => &self.schema,
            CacheTier::Metadata => &self.metadata,
        }
    }

    pub fn get(&self, key: &str, tier: CacheTier) -> Option<String> {
        let entry = self.tier(tier);
        let value = entry.cache.get(key);

        if value.is_some() {
            entry.counters.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(cache.tier = %tier, cache.result = "hit", cache.key = key, "Cache lookup");
        } else {
            entry.counters.misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(cache.tier = %tier, cache.result = "miss", cache.key = key, "Cache lookup");
        }

        value
    }

    pub fn set(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
        ttl: Option<Duration>,
        tier: CacheTier,
    ) {
        let key = key.into();
        tracing::debug!(cache.tier = %tier, cache.result = "set", cache.key = %key, "Cache store");
        self.tier(tier).cache.set(key, value.into(), ttl);
    }

    pub fn delete(&self, key: &str, tier: CacheTier) -> bool {
        let removed = self.tier(tier).cache.delete(key);
        tracing::debug!(cache.tier = %tier, cache.result = "delete", cache.key = key, removed, "Cache delete");
        removed
    }

    /// Clear one tier, or every tier when `tier` is `None`
    pub fn clear(&self, tier: Option<CacheTier>) {
        match tier {
            Some(tier) => {
                self.tier(tier).cache.clear();
                tracing::info!(cache.tier = %tier, cache.result = "clear", "Cache tier cleared");
            }
            None => {
                for tier in CacheTier::ALL {
                    self.tier(tier).cache.clear();
                }
                tracing::info!(cache.tier = "all", cache.result = "clear", "All cache tiers cleared");
            }
        }
    }

    /// Live keys of a tier from least to most recently used
    pub fn keys(&self, tier: CacheTier) -> Vec<String> {
        self.tier(tier).cache.keys()
    }

    pub fn get_stats(&self) -> CacheStats {
        let mut tiers = BTreeMap::new();
        let mut total_hits = 0;
        let mut total_misses = 0;

        for tier in CacheTier::ALL {
            let entry = self.tier(tier);
            let hits = entry.counters.hits.load(Ordering::Relaxed);
            let misses = entry.counters.misses.load(Ordering::Relaxed);
            total_hits += hits;
            total_misses += misses;
            tiers.insert(
                tier.as_str().to_string(),
                TierStats {
                    hits,
                    misses,
                    size: entry.cache.size(),
                },
            );
        }

        let total_requests = total_hits + total_misses;

        CacheStats {
            tiers,
            total_hits,
            total_misses,
            total_requests,
            hit_rate_percent: hit_rate_percent(total_hits, total_requests),
        }
    }

    /// Zero all counters; cached contents are kept
    pub fn reset_stats(&self) {
        for tier in CacheTier::ALL {
            let counters = &self.tier(tier).counters;
            counters.hits.store(0, Ordering::Relaxed);
            counters.misses.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[allow(clippy::cast_precision_loss)]
fn hit_rate_percent(hits: u64, requests: u64) -> f64 {
    if requests == 0 {
        return 0.0;
    }
    (hits as f64 / requests as f64 * 10_000.0).round() / 100.0
}
