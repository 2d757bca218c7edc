//! Query execution wrapper with security checks

use std::future::Future;
use std::time::Duration;

use crate::validation::check_sql_query;
use crate::{Error, Result};

/// Read-only policy plus a per-call deadline for SQL backends
#[derive(Debug, Clone, Copy)]
pub struct QueryGuard {
    timeout: Duration,
    max_query_limit: u32,
}

impl QueryGuard {
    #[must_use]
    pub const fn new(timeout: Duration, max_query_limit: u32) -> Self {
        Self {
            timeout,
            max_query_limit,
        }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub const fn max_query_limit(&self) -> u32 {
        self.max_query_limit
    }

    /// Validate a statement and its requested limit
    pub fn validate(&self, sql: &str, limit: u32) -> Result<()> {
        check_sql_query(sql, limit, self.max_query_limit)
    }

    /// Execute a query function with timeout
    pub async fn execute<F, T, E>(&self, query_fn: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<Error>,
    {
        tokio::time::timeout(self.timeout, query_fn)
            .await
            .map_err(|_| Error::QueryTimeout(self.timeout))?
            .map_err(Into::into)
    }
}
