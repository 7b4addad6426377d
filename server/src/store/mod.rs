//! Credential store: key-value storage with per-key expiry.
//!
//! The credential service only ever needs `set` with a TTL and `get`, so the
//! backend sits behind the narrow [`CredentialStore`] trait. Three backends ship:
//! an in-memory DashMap, a SQLite table and a shared Redis server.

pub mod memory;
pub mod purge;
pub mod redis_store;
pub mod sqlite;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{CredentialsConfig, StoreBackend};

pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use sqlite::SqliteStore;

/// Failure talking to the backing store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("store task failed: {0}")]
    TaskJoin(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Key-value store with per-key expiry.
///
/// A key whose TTL has elapsed must read back as absent. `set` on an existing
/// key overwrites both the value and the expiry.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Drop entries whose TTL has elapsed. Returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, StoreError>;
}

/// Shared handle to whichever backend was configured.
pub type SharedStore = Arc<dyn CredentialStore>;

/// Open the configured backend.
pub fn open_store(config: &CredentialsConfig) -> Result<SharedStore, Box<dyn std::error::Error>> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory credential store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => {
            let db = crate::db::init_db(&config.data_dir)?;
            Ok(Arc::new(SqliteStore::new(db)))
        }
        StoreBackend::Redis => {
            tracing::info!("Using Redis credential store");
            Ok(Arc::new(RedisStore::open(&config.redis_url)?))
        }
    }
}
