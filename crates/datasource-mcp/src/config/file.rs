//! TOML configuration file loading

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::builder::ConfigBuilder;
use super::source::SourceConfig;
use crate::Result;
use crate::cache::CacheTier;

/// Configuration file locations checked in order
const CONFIG_PATHS: &[&str] = &[
    "./datasource-mcp.toml",
    "~/.config/datasource-mcp/config.toml",
    "/etc/datasource-mcp/config.toml",
];

/// Find the first existing configuration file
pub fn find_config_file() -> Option<PathBuf> {
    for path_str in CONFIG_PATHS {
        let path = if path_str.starts_with('~') {
            if let Ok(home) = std::env::var("HOME") {
                PathBuf::from(path_str.replacen('~', &home, 1))
            } else {
                continue;
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path, builder: ConfigBuilder) -> Result<ConfigBuilder> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let file_config: FileConfig = toml::from_str(&content).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })?;

    Ok(apply_file_config(builder, file_config))
}

fn apply_file_config(mut builder: ConfigBuilder, config: FileConfig) -> ConfigBuilder {
    if let Some(server) = config.server {
        if let Some(name) = server.name {
            builder = builder.server_name(name);
        }
        if let Some(dir) = server.schema_dir {
            builder = builder.schema_dir(dir);
        }
        if let Some(concurrent) = server.concurrent_startup {
            builder = builder.concurrent_startup(concurrent);
        }
    }

    if let Some(cache) = config.cache {
        for (tier, section) in [
            (CacheTier::Query, cache.query),
            (CacheTier::Schema, cache.schema),
            (CacheTier::Metadata, cache.metadata),
        ] {
            let Some(section) = section else {
                continue;
            };
            if let Some(max) = section.max_entries.and_then(NonZeroUsize::new) {
                builder = builder.cache_max_entries(tier, max);
            }
            if let Some(ttl) = section.ttl_secs {
                builder = builder.cache_ttl(tier, Duration::from_secs(ttl));
            }
        }
    }

    if let Some(obs) = config.observability {
        if let Some(level) = obs.log_level {
            builder = builder.log_level(level);
        }
        if let Some(json) = obs.json_logs {
            builder = builder.json_logs(json);
        }
    }

    for source in config.sources {
        builder = builder.source(source);
    }

    builder
}

/// Root configuration file structure
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    server: Option<ServerFileConfig>,
    cache: Option<CacheFileConfig>,
    observability: Option<ObservabilityFileConfig>,
    #[serde(default)]
    sources: Vec<SourceConfig>,
}

#[derive(Debug, Deserialize)]
struct ServerFileConfig {
    name: Option<String>,
    schema_dir: Option<PathBuf>,
    concurrent_startup: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct CacheFileConfig {
    query: Option<TierFileConfig>,
    schema: Option<TierFileConfig>,
    metadata: Option<TierFileConfig>,
}

#[derive(Debug, Deserialize)]
struct TierFileConfig {
    max_entries: Option<usize>,
    ttl_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ObservabilityFileConfig {
    log_level: Option<String>,
    json_logs: Option<bool>,
}
