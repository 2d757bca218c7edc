use std::time::Duration;

use deadpool::managed::{self, Metrics, RecycleResult};
use hdbconnect_async::Connection;

use crate::{Error, Result};

pub type Pool = managed::Pool<ConnectionManager>;
pub type PooledConnection = managed::Object<ConnectionManager>;

#[derive(Debug)]
pub struct ConnectionManager {
    url: String,
}

impl ConnectionManager {
    pub const fn new(url: String) -> Self {
        Self { url }
    }
}

impl managed::Manager for ConnectionManager {
    type Type = Connection;
    type Error = hdbconnect::HdbError;

    async fn create(&self) -> std::result::Result<Connection, hdbconnect::HdbError> {
        Connection::new(self.url.clone()).await
    }

    async fn recycle(&self, _conn: &mut Connection, _: &Metrics) -> RecycleResult<Self::Error> {
        // Broken connections surface on the next statement.
        Ok(())
    }
}

pub fn create_pool(url: String, max_size: usize, create_timeout: Duration) -> Result<Pool> {
    Pool::builder(ConnectionManager::new(url))
        .max_size(max_size)
        .wait_timeout(Some(Duration::from_secs(10)))
        .create_timeout(Some(create_timeout))
        .recycle_timeout(Some(Duration::from_secs(5)))
        .runtime(deadpool::Runtime::Tokio1)
        .build()
        .map_err(|e| Error::Config(format!("Failed to create connection pool: {e}")))
}

/// Check out a connection, mapping pool failures to connection errors
pub async fn get_connection(pool: &Pool) -> Result<PooledConnection> {
    Box::pin(pool.get())
        .await
        .map_err(|e| Error::Connection(format!("Failed to get pooled connection: {e}")))
}
