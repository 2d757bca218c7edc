//! Security module for SQL data sources

mod query_guard;

pub use query_guard::QueryGuard;
