//! Configuration management
//!
//! Supports configuration loading with precedence: env > file > CLI > defaults.
//! Callers seed a [`ConfigBuilder`] with CLI values; the file and then the
//! environment are layered on top.

mod builder;
mod env;
mod file;
mod source;

use std::path::Path;

pub use builder::{Config, ConfigBuilder, ObservabilityConfig, ServerConfig};
pub use file::find_config_file;
pub use source::{CommonSourceConfig, HanaSourceConfig, RestSourceConfig, SourceConfig};

use crate::Result;

/// Layer the first config file found and the environment over `base`
pub fn load_config(base: ConfigBuilder) -> Result<ConfigBuilder> {
    let mut builder = base;

    if let Some(path) = file::find_config_file() {
        tracing::info!("Loading configuration from {}", path.display());
        builder = file::load_from_file(&path, builder)?;
    }

    Ok(env::load_from_env(builder))
}

/// Layer a specific config file and the environment over `base`
pub fn load_config_from_path(path: &Path, base: ConfigBuilder) -> Result<ConfigBuilder> {
    let builder = file::load_from_file(path, base)?;
    Ok(env::load_from_env(builder))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_load_config_no_file() {
        // Succeeds whether or not a config file exists on this machine
        let result = env::with_env_vars(&[], || load_config(ConfigBuilder::new()));
        assert!(result.is_ok());
    }

    #[test]
    fn test_precedence_env_over_file_over_cli() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            b"[server]\nname = \"file\"\nschema_dir = \"/from/file\"\n\n[observability]\nlog_level = \"warn\"\n",
        )
        .unwrap();
        file.flush().unwrap();

        let cli = ConfigBuilder::new()
            .server_name("cli")
            .schema_dir("/from/cli")
            .log_level("trace")
            .json_logs(true);

        let config = env::with_env_vars(&[("DSMCP_SERVER_NAME", "env")], || {
            load_config_from_path(file.path(), cli)
                .unwrap()
                .build()
                .unwrap()
        });

        assert_eq!(config.server.name, "env");
        assert_eq!(config.server.schema_dir, std::path::PathBuf::from("/from/file"));
        assert_eq!(config.observability.log_level, "warn");
        assert!(config.observability.json_logs);
    }
}
