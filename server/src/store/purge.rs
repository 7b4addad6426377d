//! Background purge task for expired credentials.

use std::time::Duration;

use super::SharedStore;

/// Spawn a background task that periodically purges expired credentials.
///
/// Expired entries already read back as absent; this only reclaims space.
/// An interval of 0 disables the task.
pub fn spawn_expiry_purge(store: SharedStore, interval_secs: u64) {
    if interval_secs == 0 {
        tracing::debug!("Credential purge disabled");
        return;
    }
    let interval = Duration::from_secs(interval_secs);

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            match store.purge_expired().await {
                Ok(0) => tracing::debug!("Credential purge: no expired entries"),
                Ok(count) => {
                    tracing::info!("Credential purge: removed {} expired entries", count)
                }
                Err(e) => tracing::error!("Credential purge error: {}", e),
            }
        }
    });
}
