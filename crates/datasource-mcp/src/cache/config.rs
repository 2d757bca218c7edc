//! Cache tier configuration types

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

/// Named cache tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTier {
    /// Query results
    Query,
    /// Schema snapshots
    Schema,
    /// Schema fingerprints and other bookkeeping
    Metadata,
}

impl CacheTier {
    pub const ALL: [Self; 3] = [Self::Query, Self::Schema, Self::Metadata];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Schema => "schema",
            Self::Metadata => "metadata",
        }
    }
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "query" => Ok(Self::Query),
            "schema" => Ok(Self::Schema),
            "metadata" => Ok(Self::Metadata),
            other => Err(Error::Config(format!("Unknown cache type: {other}"))),
        }
    }
}

/// Capacity and default TTL of one tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierConfig {
    pub max_entries: NonZeroUsize,
    pub default_ttl: Duration,
}

impl TierConfig {
    /// Returns `None` when `max_entries` is zero
    #[must_use]
    pub const fn new(max_entries: usize, default_ttl: Duration) -> Option<Self> {
        match NonZeroUsize::new(max_entries) {
            Some(max_entries) => Some(Self {
                max_entries,
                default_ttl,
            }),
            None => None,
        }
    }

    const fn with_defaults(max_entries: NonZeroUsize, ttl_secs: u64) -> Self {
        Self {
            max_entries,
            default_ttl: Duration::from_secs(ttl_secs),
        }
    }
}

/// Configuration of all three tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub query: TierConfig,
    pub schema: TierConfig,
    pub metadata: TierConfig,
}

impl CacheConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            query: TierConfig::with_defaults(NonZeroUsize::new(1000).unwrap(), 300),
            schema: TierConfig::with_defaults(NonZeroUsize::new(100).unwrap(), 3600),
            metadata: TierConfig::with_defaults(NonZeroUsize::new(500).unwrap(), 1800),
        }
    }

    #[must_use]
    pub const fn tier(&self, tier: CacheTier) -> TierConfig {
        match tier {
            CacheTier::Query => self.query,
            CacheTier::Schema => self.schema,
            CacheTier::Metadata => self.metadata,
        }
    }

    pub const fn tier_mut(&mut self, tier: CacheTier) -> &mut TierConfig {
        match tier {
            CacheTier::Query => &mut self.query,
            CacheTier::Schema => &mut self.schema,
            CacheTier::Metadata => &mut self.metadata,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}
