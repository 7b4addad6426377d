use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::auth::credentials::CredentialService;
use crate::config::{RateLimitConfig, WsConfig};
use crate::ws::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Issues and verifies publisher credentials
    pub credentials: CredentialService,
    /// Open receiver connections
    pub connections: ConnectionRegistry,
    /// Keepalive settings for receiver connections
    pub ws: WsConfig,
    /// Rate limit applied to /register_device
    pub rate_limit: RateLimitConfig,
    /// Cancelled once on server shutdown; every connection actor watches it
    pub shutdown: CancellationToken,
    /// Connection actors still running; shutdown waits on it
    pub actors: TaskTracker,
}
