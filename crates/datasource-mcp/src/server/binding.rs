//! One registered data source and the cache paths in front of it

use std::sync::Arc;

use crate::Result;
use crate::cache::{CacheKey, CacheManager, CacheTier};
use crate::context::AppContext;
use crate::datasource::DataSource;
use crate::helpers::cached_or_fetch;
use crate::schema::{SchemaSnapshot, SchemaStore};
use crate::types::{QueryParams, RefreshResult, RefreshStatus};

/// Dispatch-table entry: the source plus its tool name and resource URI
#[derive(Debug, Clone)]
pub struct SourceBinding {
    source: Arc<dyn DataSource>,
    cache: Arc<CacheManager>,
    schemas: Arc<SchemaStore>,
    tool_name: String,
    resource_uri: String,
}

impl SourceBinding {
    pub fn new(source: Arc<dyn DataSource>, context: &AppContext) -> Self {
        let tool_name = source.tool_descriptor().name;
        let resource_uri = source.resource_descriptor().uri;
        Self {
            source,
            cache: Arc::clone(&context.cache),
            schemas: Arc::clone(&context.schemas),
            tool_name,
            resource_uri,
        }
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub const fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn resource_uri(&self) -> &str {
        &self.resource_uri
    }

    /// Validate, then answer from the query tier or the backend.
    ///
    /// Rejected queries never reach the cache.
    pub async fn query(&self, params: &QueryParams) -> Result<String> {
        self.source.check_query(params).inspect_err(|e| {
            tracing::warn!(source = self.name(), error = %e, "Query rejected");
        })?;

        let key = CacheKey::query_result(
            self.name(),
            &params.query,
            &params.method,
            params.params.as_ref(),
            params.limit,
        );
        let ttl = self.source.settings().query_cache_ttl;

        cached_or_fetch(&self.cache, &key, Some(ttl), || async {
            let records = self.source.query(params).await?;
            tracing::debug!(source = self.name(), rows = records.len(), "Query executed");
            Ok::<_, crate::Error>(records)
        })
        .await
    }

    /// Serve the schema resource: memory tier, then a fresh file, then the backend.
    ///
    /// The memory tier is consulted first, so removing a snapshot from the
    /// store alone does not evict it; `Server::cleanup_stale_schemas` drops
    /// both, and the tier entry otherwise lives until its TTL lapses.
    pub async fn read_schema(&self) -> Result<String> {
        let key = CacheKey::schema(self.name());
        let ttl = self.source.settings().schema_cache_ttl;
        cached_or_fetch(&self.cache, &key, Some(ttl), || self.load_schema()).await
    }

    async fn load_schema(&self) -> Result<SchemaSnapshot> {
        if let Some(snapshot) = self.schemas.get_schema(self.name()).await? {
            tracing::debug!(source = self.name(), "Schema served from store");
            return Ok(snapshot);
        }

        let snapshot = self.source.get_schema().await?;
        self.schemas.save_schema(self.name(), &snapshot).await?;
        Ok(snapshot)
    }

    /// Regenerate, persist and re-cache the schema, reporting whether its
    /// structure changed since the last known fingerprint
    pub async fn refresh_schema(&self) -> Result<RefreshResult> {
        let snapshot = self.source.get_schema().await?;
        let fingerprint = snapshot.structure_fingerprint();

        let fingerprint_key = CacheKey::schema_fingerprint(self.name()).to_key_string();
        let previous = match self.cache.get(&fingerprint_key, CacheTier::Metadata) {
            Some(previous) => Some(previous),
            None => self
                .schemas
                .get_schema(self.name())
                .await
                .ok()
                .flatten()
                .map(|stored| stored.structure_fingerprint()),
        };
        let changed = previous.as_deref() != Some(fingerprint.as_str());

        let metadata = self.schemas.save_schema(self.name(), &snapshot).await?;

        let payload = serde_json::to_string(&snapshot)?;
        self.cache.set(
            CacheKey::schema(self.name()).to_key_string(),
            payload,
            Some(self.source.settings().schema_cache_ttl),
            CacheTier::Schema,
        );
        self.cache
            .set(fingerprint_key, fingerprint.clone(), None, CacheTier::Metadata);

        if changed {
            tracing::info!(source = self.name(), fingerprint = %fingerprint, "Schema changed");
        }

        Ok(RefreshResult {
            status: RefreshStatus::Success,
            data_source: self.name().to_string(),
            generated_at: Some(metadata.generated_at),
            total_entities: Some(snapshot.metadata.total_entities),
            fingerprint: Some(fingerprint),
            changed: Some(changed),
            error: None,
        })
    }
}
