//! Shared services handed to the server at start-up

use std::sync::Arc;

use crate::Result;
use crate::cache::CacheManager;
use crate::config::Config;
use crate::schema::SchemaStore;

/// Cache manager, schema store and server-wide switches.
///
/// Built once and passed explicitly; cloning shares the same services.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub cache: Arc<CacheManager>,
    pub schemas: Arc<SchemaStore>,
    pub concurrent_startup: bool,
}

impl AppContext {
    pub fn new(cache: Arc<CacheManager>, schemas: Arc<SchemaStore>) -> Self {
        Self {
            cache,
            schemas,
            concurrent_startup: false,
        }
    }

    /// Create the cache tiers and open the schema directory
    pub fn from_config(config: &Config) -> Result<Self> {
        let schemas = SchemaStore::new(&config.server.schema_dir)?;
        Ok(Self {
            cache: Arc::new(CacheManager::new(config.cache)),
            schemas: Arc::new(schemas),
            concurrent_startup: config.server.concurrent_startup,
        })
    }

    #[must_use]
    pub fn with_concurrent_startup(mut self, enabled: bool) -> Self {
        self.concurrent_startup = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;

    #[test]
    fn test_from_config_creates_schema_dir() {
        let dir = tempfile::tempdir().unwrap();
        let schema_dir = dir.path().join("nested").join("schemas");
        let config = ConfigBuilder::new()
            .schema_dir(&schema_dir)
            .concurrent_startup(true)
            .build()
            .unwrap();

        let context = AppContext::from_config(&config).unwrap();

        assert!(schema_dir.is_dir());
        assert_eq!(context.schemas.dir(), schema_dir.as_path());
        assert!(context.concurrent_startup);
        assert_eq!(context.cache.get_stats().total_requests, 0);
    }
}
