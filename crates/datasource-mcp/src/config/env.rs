//! Environment variable loading for configuration

use std::env;
use std::num::NonZeroUsize;
use std::time::Duration;

use super::builder::ConfigBuilder;
use crate::cache::CacheTier;

/// Environment variable names
mod vars {
    pub const SERVER_NAME: &str = "DSMCP_SERVER_NAME";
    pub const SCHEMA_DIR: &str = "DSMCP_SCHEMA_DIR";
    pub const CONCURRENT_STARTUP: &str = "DSMCP_CONCURRENT_STARTUP";
    pub const QUERY_CACHE_SIZE: &str = "DSMCP_QUERY_CACHE_SIZE";
    pub const QUERY_CACHE_TTL_SECS: &str = "DSMCP_QUERY_CACHE_TTL_SECS";
    pub const SCHEMA_CACHE_TTL_SECS: &str = "DSMCP_SCHEMA_CACHE_TTL_SECS";
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const JSON_LOGS: &str = "DSMCP_JSON_LOGS";

    #[cfg(test)]
    pub const ALL: &[&str] = &[
        SERVER_NAME,
        SCHEMA_DIR,
        CONCURRENT_STARTUP,
        QUERY_CACHE_SIZE,
        QUERY_CACHE_TTL_SECS,
        SCHEMA_CACHE_TTL_SECS,
        RUST_LOG,
        JSON_LOGS,
    ];
}

#[cfg(test)]
pub(super) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Apply environment overrides; unparsable values are ignored
pub fn load_from_env(mut builder: ConfigBuilder) -> ConfigBuilder {
    if let Ok(name) = env::var(vars::SERVER_NAME) {
        builder = builder.server_name(name);
    }

    if let Ok(dir) = env::var(vars::SCHEMA_DIR)
        && !dir.trim().is_empty()
    {
        builder = builder.schema_dir(dir);
    }

    if let Ok(val) = env::var(vars::CONCURRENT_STARTUP) {
        builder = builder.concurrent_startup(parse_bool(&val));
    }

    if let Ok(size_str) = env::var(vars::QUERY_CACHE_SIZE)
        && let Ok(size) = size_str.parse::<usize>()
        && let Some(nz) = NonZeroUsize::new(size)
    {
        builder = builder.cache_max_entries(CacheTier::Query, nz);
    }

    if let Some(ttl) = parse_secs(vars::QUERY_CACHE_TTL_SECS) {
        builder = builder.cache_ttl(CacheTier::Query, ttl);
    }

    if let Some(ttl) = parse_secs(vars::SCHEMA_CACHE_TTL_SECS) {
        builder = builder.cache_ttl(CacheTier::Schema, ttl);
    }

    if let Ok(level) = env::var(vars::RUST_LOG) {
        builder = builder.log_level(level);
    }

    if let Ok(val) = env::var(vars::JSON_LOGS) {
        builder = builder.json_logs(parse_bool(&val));
    }

    builder
}

fn parse_secs(var: &str) -> Option<Duration> {
    env::var(var)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

#[cfg(test)]
pub(super) fn with_env_vars<F, R>(overrides: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);

    let old_values: Vec<_> = vars::ALL.iter().map(|k| (*k, env::var(k).ok())).collect();

    for key in vars::ALL {
        // SAFETY: We hold a mutex lock to ensure no concurrent modifications
        unsafe { env::remove_var(key) };
    }
    for (key, value) in overrides {
        // SAFETY: We hold a mutex lock to ensure no concurrent modifications
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    for (key, old_value) in old_values {
        match old_value {
            // SAFETY: We hold a mutex lock to ensure no concurrent modifications
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("1"));
        assert!(parse_bool("yes"));
        assert!(parse_bool("on"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("no"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_load_server_settings() {
        with_env_vars(
            &[
                ("DSMCP_SERVER_NAME", "env-server"),
                ("DSMCP_SCHEMA_DIR", "/srv/schemas"),
                ("DSMCP_CONCURRENT_STARTUP", "yes"),
            ],
            || {
                let config = load_from_env(ConfigBuilder::new()).build().unwrap();
                assert_eq!(config.server.name, "env-server");
                assert_eq!(config.server.schema_dir, PathBuf::from("/srv/schemas"));
                assert!(config.server.concurrent_startup);
            },
        );
    }

    #[test]
    fn test_load_cache_settings() {
        with_env_vars(
            &[
                ("DSMCP_QUERY_CACHE_SIZE", "42"),
                ("DSMCP_QUERY_CACHE_TTL_SECS", "15"),
                ("DSMCP_SCHEMA_CACHE_TTL_SECS", "900"),
            ],
            || {
                let config = load_from_env(ConfigBuilder::new()).build().unwrap();
                assert_eq!(config.cache.query.max_entries.get(), 42);
                assert_eq!(config.cache.query.default_ttl, Duration::from_secs(15));
                assert_eq!(config.cache.schema.default_ttl, Duration::from_secs(900));
                assert_eq!(config.cache.metadata.default_ttl, Duration::from_secs(1800));
            },
        );
    }

    #[test]
    fn test_invalid_numbers_ignored() {
        with_env_vars(
            &[
                ("DSMCP_QUERY_CACHE_SIZE", "0"),
                ("DSMCP_QUERY_CACHE_TTL_SECS", "soon"),
            ],
            || {
                let config = load_from_env(ConfigBuilder::new()).build().unwrap();
                assert_eq!(config.cache.query.max_entries.get(), 1000);
                assert_eq!(config.cache.query.default_ttl, Duration::from_secs(300));
            },
        );
    }

    #[test]
    fn test_load_logging_settings() {
        with_env_vars(
            &[("RUST_LOG", "debug"), ("DSMCP_JSON_LOGS", "true")],
            || {
                let config = load_from_env(ConfigBuilder::new()).build().unwrap();
                assert_eq!(config.observability.log_level, "debug");
                assert!(config.observability.json_logs);
            },
        );
    }

    #[test]
    fn test_env_overrides_builder() {
        with_env_vars(&[("DSMCP_SERVER_NAME", "env-server")], || {
            let builder = ConfigBuilder::new().server_name("file-server");
            let config = load_from_env(builder).build().unwrap();
            assert_eq!(config.server.name, "env-server");
        });
    }

    #[test]
    fn test_load_no_env_vars() {
        with_env_vars(&[], || {
            let config = load_from_env(ConfigBuilder::new().server_name("kept"))
                .build()
                .unwrap();
            assert_eq!(config.server.name, "kept");
            assert_eq!(config.observability.log_level, "info");
        });
    }
}
