use axum::extract::ws::Message;
use serde::Serialize;

use super::ConnectionRegistry;

impl ConnectionRegistry {
    /// Serialize `payload` once and queue it as a JSON text frame on every
    /// registered connection.
    ///
    /// Best effort: a connection whose actor has already gone is skipped and
    /// left for its own lifecycle to deregister.
    pub fn broadcast<T: Serialize>(&self, payload: &T) {
        let json = match serde_json::to_string(payload) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize broadcast payload");
                return;
            }
        };
        let msg = Message::Text(json.into());

        let mut delivered = 0usize;
        let mut gone = 0usize;

        for entry in self.connections.iter() {
            if entry.value().send(msg.clone()).is_ok() {
                delivered += 1;
            } else {
                gone += 1;
                tracing::debug!(
                    connection_id = %entry.key(),
                    "Peer gone before broadcast, skipping"
                );
            }
        }

        tracing::debug!(delivered, gone, "Broadcast complete");
    }
}
