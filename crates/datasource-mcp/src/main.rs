use std::path::PathBuf;

use clap::{Parser, Subcommand};
use datasource_mcp::config::{self, ConfigBuilder};
use datasource_mcp::observability::init_observability;
use datasource_mcp::{QueryParams, Server};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "datasource-mcp")]
#[command(about = "Cached, read-only query and schema surface over SQL and REST data sources", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "DSMCP_CONFIG")]
    config: Option<PathBuf>,

    /// Server name reported by `server://info`
    #[arg(long)]
    server_name: Option<String>,

    /// Directory holding persisted schema snapshots
    #[arg(long)]
    schema_dir: Option<PathBuf>,

    /// Connect and disconnect data sources concurrently
    #[arg(long)]
    concurrent: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable JSON logging output
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List configured data sources with redacted configuration
    Sources,
    /// List the tools and resources the server exposes
    Tools,
    /// Check every data source
    Health,
    /// Regenerate schema snapshots for one or all data sources
    Refresh {
        /// Data source to refresh; all when omitted
        source: Option<String>,
    },
    /// Run a read-only query against a data source
    Query {
        source: String,
        /// SQL statement or REST endpoint path
        query: String,
        /// Maximum number of records
        #[arg(short, long, default_value = "100")]
        limit: u32,
        /// HTTP method for REST sources
        #[arg(short, long, default_value = "GET")]
        method: String,
    },
    /// Print a data source's schema snapshot
    Schema { source: String },
    /// Delete stale schema snapshots
    Cleanup,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_payload(payload: &str) -> anyhow::Result<()> {
    let value: serde_json::Value = serde_json::from_str(payload)?;
    print_json(&value)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // CLI values seed the builder; the file and then the environment override them
    let mut cli = ConfigBuilder::new().concurrent_startup(args.concurrent);
    if let Some(name) = args.server_name {
        cli = cli.server_name(name);
    }
    if let Some(dir) = args.schema_dir {
        cli = cli.schema_dir(dir);
    }
    if args.verbose {
        cli = cli.log_level("debug");
    }
    if args.json_logs {
        cli = cli.json_logs(true);
    }

    let builder = if let Some(ref path) = args.config {
        config::load_config_from_path(path, cli)?
    } else {
        config::load_config(cli)?
    };
    let config = builder.build()?;

    init_observability(&config.observability)?;

    let server = Server::from_config(&config)?;
    tracing::info!(
        server = server.name(),
        sources = config.sources.len(),
        schema_dir = %config.server.schema_dir.display(),
        "Server configured"
    );

    match args.command {
        Command::Sources => print_json(&server.list_data_sources())?,
        Command::Tools => {
            print_json(&serde_json::json!({
                "tools": server.tools(),
                "resources": server.resources(),
            }))?;
        }
        Command::Cleanup => {
            let removed = server.cleanup_stale_schemas().await?;
            print_json(&serde_json::json!({ "removed": removed }))?;
        }
        Command::Health => {
            server.start().await;
            let health = server.health_check().await;
            server.stop().await;
            print_json(&health)?;
        }
        Command::Refresh { source } => {
            server.start().await;
            let outcome = server.refresh_schema(source.as_deref()).await;
            server.stop().await;
            print_json(&outcome?)?;
        }
        Command::Query {
            source,
            query,
            limit,
            method,
        } => {
            server.start().await;
            let params = QueryParams::new(query, limit).with_method(method);
            let payload = server.query(&source, &params).await;
            server.stop().await;
            print_payload(&payload?)?;
        }
        Command::Schema { source } => {
            server.start().await;
            let payload = server.read_resource(&format!("{source}://schema")).await;
            server.stop().await;
            print_payload(&payload?)?;
        }
    }

    Ok(())
}
