//! Redis-backed credential store.
//!
//! Keys are written with `SET key value PX ttl_ms`, so Redis expires them itself
//! and several server processes can share one credential set.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError};
use tokio::sync::Mutex;

use super::{CredentialStore, StoreError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

impl From<RedisError> for StoreError {
    fn from(e: RedisError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

pub struct RedisStore {
    client: Client,
    /// Opened on first use and dropped after a connection-level failure,
    /// so the next command reconnects.
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisStore {
    /// Parse the server URL. No connection is made until the first command.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_multiplexed_async_connection_with_timeouts(RESPONSE_TIMEOUT, CONNECT_TIMEOUT)
            .await?;
        tracing::debug!("Connected to Redis credential store");
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn command_failed(&self, e: RedisError) -> StoreError {
        if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() {
            tracing::warn!(error = %e, "Redis connection lost");
            self.conn.lock().await.take();
        }
        e.into()
    }
}

#[async_trait]
impl CredentialStore for RedisStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        // PX rejects zero
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let mut conn = self.connection().await?;

        let result: redis::RedisResult<()> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.command_failed(e).await),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;

        let result: redis::RedisResult<Option<String>> = conn.get(key).await;
        match result {
            Ok(value) => Ok(value),
            Err(e) => Err(self.command_failed(e).await),
        }
    }

    /// Redis evicts expired keys on its own.
    async fn purge_expired(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}
