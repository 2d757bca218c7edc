//! In-memory TTL cache with LRU eviction

use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::config::TierConfig;

struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

/// Thread-safe key/value cache with per-entry TTL and bounded capacity.
///
/// The underlying [`LruCache`] is unbounded and only used as an ordered
/// queue; capacity is enforced in [`TtlCache::set`], which sweeps expired
/// entries before evicting the least recently used ones.
///
/// Expired entries are reported as misses by [`TtlCache::get`] but stay in
/// place until the next write-side sweep, [`TtlCache::size`] or
/// [`TtlCache::keys`].
pub struct TtlCache<V> {
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    max_entries: NonZeroUsize,
    default_ttl: Duration,
}

impl<V> fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("max_entries", &self.max_entries)
            .field("default_ttl", &self.default_ttl)
            .field("entry_count", &self.entries.lock().len())
            .finish_non_exhaustive()
    }
}

impl<V: Clone> TtlCache<V> {
    #[must_use]
    pub fn new(max_entries: NonZeroUsize, default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
            max_entries,
            default_ttl,
        }
    }

    #[must_use]
    pub fn from_config(config: TierConfig) -> Self {
        Self::new(config.max_entries, config.default_ttl)
    }

    #[must_use]
    pub const fn max_entries(&self) -> NonZeroUsize {
        self.max_entries
    }

    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a live entry and mark it most recently used
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if entries.peek(key).is_none_or(|entry| entry.is_expired(now)) {
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert or replace an entry, `ttl` overriding the default
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let now = Instant::now();
        let mut entries = self.entries.lock();

        entries.pop(&key);
        Self::sweep(&mut entries, now);
        while entries.len() >= self.max_entries.get() {
            if entries.pop_lru().is_none() {
                break;
            }
        }

        entries.push(
            key,
            CacheEntry {
                value,
                stored_at: now,
                ttl: ttl.unwrap_or(self.default_ttl),
            },
        );
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().pop(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of live entries
    pub fn size(&self) -> usize {
        let mut entries = self.entries.lock();
        Self::sweep(&mut entries, Instant::now());
        entries.len()
    }

    /// Live keys from least to most recently used
    pub fn keys(&self) -> Vec<String> {
        let mut entries = self.entries.lock();
        Self::sweep(&mut entries, Instant::now());
        entries.iter().rev().map(|(key, _)| key.clone()).collect()
    }

    fn sweep(entries: &mut LruCache<String, CacheEntry<V>>, now: Instant) {
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in expired {
            entries.pop(&key);
        }
    }
}
