//! Server orchestrator
//!
//! Owns the registry of data sources and routes tool calls and resource
//! reads to them. Each source contributes one `query_<name>` tool and one
//! `<name>://schema` resource; the server adds the built-in tools and the
//! `server://info` resource.

mod binding;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use serde_json::{Value, json};

pub use binding::SourceBinding;

use crate::cache::{CacheKey, CacheManager, CacheStats, CacheTier};
use crate::config::Config;
use crate::context::AppContext;
use crate::datasource::{self, DataSource};
use crate::error::ErrorResponse;
use crate::types::{
    DataSourceSummary, HealthStatus, LifecycleReport, QueryParams, RefreshOutcome, RefreshResult,
    ResourceDescriptor, ServerInfo, ToolDescriptor,
};
use crate::validation::validate_source_name;
use crate::{Error, Result};

pub const TOOL_LIST_DATA_SOURCES: &str = "list_data_sources";
pub const TOOL_HEALTH_CHECK: &str = "health_check";
pub const TOOL_REFRESH_SCHEMA: &str = "refresh_schema";
pub const TOOL_CACHE_STATS: &str = "cache_stats";
pub const SERVER_INFO_URI: &str = "server://info";

const SCHEMA_URI_SUFFIX: &str = "://schema";

pub struct Server {
    name: String,
    context: AppContext,
    sources: BTreeMap<String, SourceBinding>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("name", &self.name)
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .field("concurrent_startup", &self.context.concurrent_startup)
            .finish_non_exhaustive()
    }
}

impl Server {
    pub fn new(name: impl Into<String>, context: AppContext) -> Self {
        Self {
            name: name.into(),
            context,
            sources: BTreeMap::new(),
        }
    }

    /// Build the context and register every configured source
    pub fn from_config(config: &Config) -> Result<Self> {
        let context = AppContext::from_config(config)?;
        let mut server = Self::new(&config.server.name, context);
        for source_config in &config.sources {
            let source = datasource::from_config(source_config)?;
            server.add_data_source(source_config.name(), source)?;
        }
        Ok(server)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn context(&self) -> &AppContext {
        &self.context
    }

    /// Register a source under `name`, which must match the source's own name
    pub fn add_data_source(&mut self, name: &str, source: Arc<dyn DataSource>) -> Result<()> {
        validate_source_name(name)?;
        if source.name() != name {
            return Err(Error::Config(format!(
                "Data source registered as '{name}' reports name '{}'",
                source.name()
            )));
        }
        if self.sources.contains_key(name) {
            return Err(Error::Config(format!(
                "Data source '{name}' is already registered"
            )));
        }

        let binding = SourceBinding::new(source, &self.context);
        tracing::info!(
            source = name,
            kind = binding.source().kind(),
            tool = binding.tool_name(),
            resource = binding.resource_uri(),
            "Data source registered"
        );
        self.sources.insert(name.to_string(), binding);
        Ok(())
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    pub fn binding(&self, name: &str) -> Result<&SourceBinding> {
        self.sources
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("Unknown data source: {name}")))
    }

    /// Per-source query tools followed by the built-in tools
    pub fn tools(&self) -> Vec<ToolDescriptor> {
        let mut tools: Vec<_> = self
            .sources
            .values()
            .map(|b| b.source().tool_descriptor())
            .collect();
        tools.extend(builtin_tools());
        tools
    }

    pub fn resources(&self) -> Vec<ResourceDescriptor> {
        let mut resources: Vec<_> = self
            .sources
            .values()
            .map(|b| b.source().resource_descriptor())
            .collect();
        resources.push(ResourceDescriptor {
            uri: SERVER_INFO_URI.to_string(),
            name: "Server info".to_string(),
            description: "Server name, version and registered data sources".to_string(),
            mime_type: "application/json".to_string(),
        });
        resources
    }

    /// Cached, validated query against one source
    pub async fn query(&self, source: &str, params: &QueryParams) -> Result<String> {
        self.binding(source)?.query(params).await
    }

    /// Dispatch a tool call by name.
    ///
    /// Success yields the serialized payload; failures come back as the
    /// structured `{error, kind}` response.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> std::result::Result<String, ErrorResponse> {
        tracing::debug!(tool = name, "Tool call");
        self.dispatch_tool(name, arguments).await.map_err(|e| {
            tracing::warn!(tool = name, error = %e, "Tool call failed");
            ErrorResponse::from(e)
        })
    }

    async fn dispatch_tool(&self, name: &str, arguments: Value) -> Result<String> {
        match name {
            TOOL_LIST_DATA_SOURCES => to_payload(&self.list_data_sources()),
            TOOL_HEALTH_CHECK => to_payload(&self.health_check().await),
            TOOL_CACHE_STATS => to_payload(&self.cache_stats()),
            TOOL_REFRESH_SCHEMA => {
                let source = arguments.get("data_source").and_then(Value::as_str);
                to_payload(&self.refresh_schema(source).await?)
            }
            other => {
                let binding = other
                    .strip_prefix("query_")
                    .and_then(|source| self.sources.get(source))
                    .ok_or_else(|| Error::NotFound(format!("Unknown tool: {other}")))?;
                let params: QueryParams = serde_json::from_value(arguments)
                    .map_err(|e| Error::validation(format!("Invalid query arguments: {e}")))?;
                binding.query(&params).await
            }
        }
    }

    /// Read `server://info` or a `<source>://schema` resource
    pub async fn read_resource(&self, uri: &str) -> Result<String> {
        if uri == SERVER_INFO_URI {
            return to_payload(&self.server_info());
        }

        let binding = uri
            .strip_suffix(SCHEMA_URI_SUFFIX)
            .and_then(|source| self.sources.get(source))
            .ok_or_else(|| Error::NotFound(format!("Unknown resource: {uri}")))?;
        binding.read_schema().await
    }

    /// Refresh one source, or every source when `source` is `None`.
    ///
    /// A full refresh keeps going past failing sources and reports each
    /// one's outcome.
    pub async fn refresh_schema(&self, source: Option<&str>) -> Result<RefreshOutcome> {
        if let Some(name) = source {
            let result = self.binding(name)?.refresh_schema().await?;
            return Ok(RefreshOutcome::Single(result));
        }

        let mut results = BTreeMap::new();
        for (name, binding) in &self.sources {
            let result = binding.refresh_schema().await.unwrap_or_else(|e| {
                tracing::error!(source = %name, error = %e, "Schema refresh failed");
                RefreshResult::failed(name, e.to_string())
            });
            results.insert(name.clone(), result);
        }
        Ok(RefreshOutcome::All(results))
    }

    /// Connect every source; failures are reported, not raised
    pub async fn start(&self) -> LifecycleReport {
        tracing::info!(
            server = %self.name,
            sources = self.sources.len(),
            concurrent = self.context.concurrent_startup,
            "Starting data sources"
        );
        let report = self.run_lifecycle(true).await;
        for (source, error) in &report.failed {
            tracing::error!(source = %source, error = %error, "Failed to connect data source");
        }
        report
    }

    pub async fn stop(&self) -> LifecycleReport {
        tracing::info!(server = %self.name, "Stopping data sources");
        self.run_lifecycle(false).await
    }

    async fn run_lifecycle(&self, connect: bool) -> LifecycleReport {
        let operations = self.sources.values().map(|binding| async move {
            let source = binding.source();
            let ok = if connect {
                source.connect().await
            } else {
                source.disconnect().await
            };
            let error = (!ok).then(|| {
                source.last_error().unwrap_or_else(|| {
                    let action = if connect { "connect" } else { "disconnect" };
                    format!("{action} failed")
                })
            });
            (binding.name().to_string(), error)
        });

        let outcomes = if self.context.concurrent_startup {
            join_all(operations).await
        } else {
            let mut outcomes = Vec::with_capacity(self.sources.len());
            for operation in operations {
                outcomes.push(operation.await);
            }
            outcomes
        };

        let mut report = LifecycleReport::default();
        for (name, error) in outcomes {
            match error {
                None => report.succeeded.push(name),
                Some(error) => {
                    report.failed.insert(name, error);
                }
            }
        }
        report
    }

    pub async fn health_check(&self) -> BTreeMap<String, HealthStatus> {
        let checks = self.sources.iter().map(|(name, binding)| async move {
            (name.clone(), binding.source().health_check().await)
        });
        join_all(checks).await.into_iter().collect()
    }

    pub fn list_data_sources(&self) -> Vec<DataSourceSummary> {
        self.sources
            .values()
            .map(|binding| {
                let source = binding.source();
                DataSourceSummary {
                    name: source.name().to_string(),
                    kind: source.kind().to_string(),
                    connected: source.is_connected(),
                    config: source.config_metadata(),
                }
            })
            .collect()
    }

    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            name: self.name.clone(),
            data_sources: self.source_names(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.context.cache.get_stats()
    }

    /// Clear one tier by name, or every tier
    pub fn clear_cache(&self, tier: Option<&str>) -> Result<()> {
        let tier = tier.map(CacheManager::tier_from_name).transpose()?;
        self.context.cache.clear(tier);
        Ok(())
    }

    /// Delete stale snapshots from the store along with their schema tier
    /// entries, so the resource is regenerated on the next read
    pub async fn cleanup_stale_schemas(&self) -> Result<usize> {
        let stale: Vec<String> = self
            .context
            .schemas
            .list_cached_schemas()
            .await?
            .into_iter()
            .filter_map(|(name, info)| (!info.is_fresh).then_some(name))
            .collect();

        let removed = self.context.schemas.cleanup_stale_schemas().await?;
        for name in &stale {
            self.context
                .cache
                .delete(&CacheKey::schema(name).to_key_string(), CacheTier::Schema);
        }
        Ok(removed)
    }
}

fn to_payload<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn builtin_tools() -> Vec<ToolDescriptor> {
    let no_arguments = json!({"type": "object", "properties": {}});
    vec![
        ToolDescriptor {
            name: TOOL_LIST_DATA_SOURCES.to_string(),
            description: "List registered data sources with their redacted configuration"
                .to_string(),
            input_schema: no_arguments.clone(),
        },
        ToolDescriptor {
            name: TOOL_HEALTH_CHECK.to_string(),
            description: "Check the health of every data source".to_string(),
            input_schema: no_arguments.clone(),
        },
        ToolDescriptor {
            name: TOOL_REFRESH_SCHEMA.to_string(),
            description: "Regenerate schema snapshots for one or all data sources".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "data_source": {
                        "type": "string",
                        "description": "Source to refresh; all sources when omitted"
                    }
                }
            }),
        },
        ToolDescriptor {
            name: TOOL_CACHE_STATS.to_string(),
            description: "Hit and miss counters for every cache tier".to_string(),
            input_schema: no_arguments,
        },
    ]
}
