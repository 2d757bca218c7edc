//! Configuration builder

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use super::source::SourceConfig;
use crate::Error;
use crate::cache::{CacheConfig, CacheTier, TierConfig};
use crate::constants::{DEFAULT_SCHEMA_DIR, DEFAULT_SERVER_NAME};
use crate::validation::validate_source_name;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub observability: ObservabilityConfig,
    pub sources: Vec<SourceConfig>,
}

impl Config {
    #[must_use]
    pub const fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    #[must_use]
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub name: String,
    /// Directory holding persisted schema snapshots
    pub schema_dir: PathBuf,
    /// Connect and disconnect sources concurrently instead of one by one
    pub concurrent_startup: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub json_logs: bool,
}

/// Configuration builder with fluent API
#[derive(Debug)]
pub struct ConfigBuilder {
    server_name: Option<String>,
    schema_dir: Option<PathBuf>,
    concurrent_startup: bool,
    cache: CacheConfig,
    log_level: Option<String>,
    json_logs: bool,
    sources: Vec<SourceConfig>,
}

impl ConfigBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            server_name: None,
            schema_dir: None,
            concurrent_startup: false,
            cache: CacheConfig::new(),
            log_level: None,
            json_logs: false,
            sources: Vec::new(),
        }
    }

    #[must_use]
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn schema_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schema_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub const fn concurrent_startup(mut self, enabled: bool) -> Self {
        self.concurrent_startup = enabled;
        self
    }

    /// Replace one tier's capacity and TTL
    #[must_use]
    pub const fn cache_tier(mut self, tier: CacheTier, config: TierConfig) -> Self {
        *self.cache.tier_mut(tier) = config;
        self
    }

    #[must_use]
    pub const fn cache_max_entries(mut self, tier: CacheTier, max: NonZeroUsize) -> Self {
        self.cache.tier_mut(tier).max_entries = max;
        self
    }

    #[must_use]
    pub const fn cache_ttl(mut self, tier: CacheTier, ttl: Duration) -> Self {
        self.cache.tier_mut(tier).default_ttl = ttl;
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    #[must_use]
    pub const fn json_logs(mut self, enabled: bool) -> Self {
        self.json_logs = enabled;
        self
    }

    /// Add a source, replacing any earlier source with the same name
    #[must_use]
    pub fn source(mut self, source: SourceConfig) -> Self {
        self.sources.retain(|s| s.name() != source.name());
        self.sources.push(source);
        self
    }

    /// Replace the whole source list
    #[must_use]
    pub fn sources(mut self, sources: Vec<SourceConfig>) -> Self {
        self.sources = sources;
        self
    }

    /// Build the configuration
    pub fn build(self) -> crate::Result<Config> {
        let mut seen = BTreeSet::new();
        for source in &self.sources {
            validate_source_name(source.name())
                .map_err(|e| Error::Config(format!("Invalid source configuration: {e}")))?;
            if !seen.insert(source.name()) {
                return Err(Error::Config(format!(
                    "Duplicate data source name: {}",
                    source.name()
                )));
            }
        }

        let name = self
            .server_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string());

        let log_level = self
            .log_level
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| "info".to_string());

        Ok(Config {
            server: ServerConfig {
                name,
                schema_dir: self
                    .schema_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SCHEMA_DIR)),
                concurrent_startup: self.concurrent_startup,
            },
            cache: self.cache,
            observability: ObservabilityConfig {
                log_level,
                json_logs: self.json_logs,
            },
            sources: self.sources,
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
