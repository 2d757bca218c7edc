//! Cached, read-only query and schema surface over heterogeneous data sources
//!
//! Registered [`DataSource`]s (SAP HANA through [`SqlDataSource`], JSON APIs
//! through [`RestDataSource`]) are exposed by a [`Server`] as one
//! `query_<name>` tool and one `<name>://schema` resource each. Query results
//! and schema snapshots are served from a tiered TTL cache; snapshots are
//! also persisted by a [`SchemaStore`] with freshness tracking.

pub mod cache;
pub mod config;
mod constants;
mod context;
pub mod datasource;
mod error;
mod helpers;
pub mod observability;
mod pool;
pub mod schema;
pub mod security;
pub mod server;
pub mod types;
mod validation;

pub use cache::{CacheConfig, CacheKey, CacheManager, CacheStats, CacheTier, TtlCache};
pub use config::{Config, ConfigBuilder};
pub use context::AppContext;
pub use datasource::{DataSource, RestDataSource, SqlBackend, SqlDataSource};
pub use error::{Error, ErrorKind, ErrorResponse, Result};
pub use schema::{SchemaSnapshot, SchemaStore};
pub use server::Server;
pub use types::*;
pub use validation::{is_valid_identifier, is_valid_source_name};
