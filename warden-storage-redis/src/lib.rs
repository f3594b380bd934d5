//! Redis attempt store for warden
//!
//! [`RedisAttemptStore`] maps every [`AttemptStore`] operation onto one Redis
//! command over a `deadpool-redis` connection pool. Counters and expiries are
//! enforced by Redis itself, so any number of servers sharing the same Redis
//! enforce one policy.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use warden_storage_redis::RedisAttemptStore;
//!
//! let store = Arc::new(RedisAttemptStore::from_url("redis://127.0.0.1:6379")?);
//! store.health_check().await?;
//! ```

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::RedisError;
use warden_core::{AttemptStore, Error, error::StorageError, error::utilities::StoreResultExt};

/// Keys requested per `SCAN` round trip.
const SCAN_BATCH_SIZE: u32 = 100;

/// Attempt store backed by Redis.
#[derive(Clone)]
pub struct RedisAttemptStore {
    pool: Pool,
}

impl RedisAttemptStore {
    /// Create a store over an existing pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a store with a fresh pool for `url`.
    ///
    /// No connection is opened until the first command.
    pub fn from_url(url: &str) -> Result<Self, Error> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_connection_err()?;
        Ok(Self::new(pool))
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn connection(&self) -> Result<Connection, Error> {
        self.pool.get().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to get Redis connection for attempt store");
            Error::Storage(StorageError::Connection(e.to_string()))
        })
    }
}

/// Classify a command error. Transport failures are reported as connection
/// errors so callers can apply their store failure policy.
fn command_error(command: &str, e: RedisError) -> Error {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
    {
        Error::Storage(StorageError::Connection(format!("{command}: {e}")))
    } else {
        Error::Storage(StorageError::Command(format!("{command}: {e}")))
    }
}

#[async_trait]
impl AttemptStore for RedisAttemptStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let mut conn = self.connection().await?;
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("GET", e))
    }

    async fn incr(&self, key: &str) -> Result<i64, Error> {
        let mut conn = self.connection().await?;
        redis::cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("INCR", e))
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), Error> {
        let mut conn = self.connection().await?;
        let _: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("EXPIRE", e))?;
        Ok(())
    }

    async fn setex(&self, key: &str, seconds: u64, value: &str) -> Result<(), Error> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("SET", e))?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), Error> {
        let mut conn = self.connection().await?;
        let _: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("DEL", e))?;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, Error> {
        let mut conn = self.connection().await?;
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH_SIZE)
                .query_async(&mut conn)
                .await
                .map_err(|e| command_error("SCAN", e))?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn health_check(&self) -> Result<(), Error> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("PING", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::ErrorKind;

    #[test]
    fn test_io_errors_are_connection_errors() {
        let error = command_error("INCR", RedisError::from((ErrorKind::IoError, "broken pipe")));
        assert!(error.is_store_unavailable());
        assert!(error.to_string().contains("INCR"));
    }

    #[test]
    fn test_type_errors_are_command_errors() {
        let error = command_error(
            "INCR",
            RedisError::from((ErrorKind::TypeError, "value is not an integer")),
        );
        assert!(error.is_storage_error());
        assert!(!error.is_store_unavailable());
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_connection_error() {
        let store = RedisAttemptStore::from_url("redis://127.0.0.1:1").unwrap();

        let result = store.health_check().await;
        assert!(matches!(result, Err(e) if e.is_store_unavailable()));

        let result = store.incr("login_attempts:a@b.com").await;
        assert!(matches!(result, Err(e) if e.is_store_unavailable()));
    }
}
