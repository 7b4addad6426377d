use axum::{routing::get, routing::post, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::auth::registration;
use crate::config::RateLimitConfig;
use crate::signal::publish;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the full axum Router with all routes and middleware.
///
/// Must be served with `into_make_service_with_connect_info::<SocketAddr>()`:
/// the receiver handler and the rate limiter both read the peer address.
pub fn build_router(state: AppState) -> Router {
    let registration_routes = with_rate_limit(
        Router::new().route("/register_device", get(registration::register_device)),
        &state.rate_limit,
    );

    // Credential checked inside the handler
    let publish_routes = Router::new().route("/send_message", post(publish::send_message));

    // Receivers: no auth
    let ws_routes = Router::new().route("/ws", get(ws_handler::ws_upgrade));

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(registration_routes)
        .merge(publish_routes)
        .merge(ws_routes)
        .merge(health)
        .with_state(state)
}

/// Per-IP limiter for credential issuance.
/// Uses PeerIpKeyExtractor which reads from ConnectInfo<SocketAddr>.
fn with_rate_limit(routes: Router<AppState>, config: &RateLimitConfig) -> Router<AppState> {
    if !config.enabled {
        return routes;
    }

    let Some(governor_config) = GovernorConfigBuilder::default()
        .key_extractor(PeerIpKeyExtractor)
        .per_second(config.period_secs)
        .burst_size(config.burst_size)
        .finish()
    else {
        tracing::warn!(
            period_secs = config.period_secs,
            burst_size = config.burst_size,
            "Invalid rate limit settings, registration is not rate limited"
        );
        return routes;
    };
    let governor_config = Arc::new(governor_config);

    // Spawn background task to clean up rate limiter state
    let limiter = governor_config.limiter().clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;
            limiter.retain_recent();
        }
    });

    routes.layer(GovernorLayer {
        config: governor_config,
    })
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
