//! SQLite-backed credential store.
//!
//! Expiry is kept as unix milliseconds so sub-second TTLs compare correctly.
//! Reads filter on `expires_at_ms > now`; physical deletion is left to the purge task.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{CredentialStore, StoreError};
use crate::db::DbPool;

#[derive(Clone)]
pub struct SqliteStore {
    db: DbPool,
}

impl SqliteStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|e| StoreError::Backend(format!("DB lock error: {}", e)))?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::TaskJoin(e.to_string()))?
    }
}

fn expiry_millis(ttl: Duration) -> i64 {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    Utc::now().timestamp_millis().saturating_add(ttl_ms)
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let key = key.to_string();
        let value = value.to_string();
        let expires_at_ms = expiry_millis(ttl);

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO device_credentials (device_id, token, expires_at_ms, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(device_id) DO UPDATE SET
                     token = excluded.token,
                     expires_at_ms = excluded.expires_at_ms,
                     created_at = excluded.created_at",
                rusqlite::params![key, value, expires_at_ms, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = key.to_string();

        self.with_conn(move |conn| {
            let result = conn.query_row(
                "SELECT token FROM device_credentials WHERE device_id = ?1 AND expires_at_ms > ?2",
                rusqlite::params![key, Utc::now().timestamp_millis()],
                |row| row.get::<_, String>(0),
            );

            match result {
                Ok(token) => Ok(Some(token)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM device_credentials WHERE expires_at_ms <= ?1",
                [Utc::now().timestamp_millis()],
            )?;
            Ok(removed)
        })
        .await
    }
}
