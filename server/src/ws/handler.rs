use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, State},
    response::Response,
};
use std::net::SocketAddr;

use crate::state::AppState;
use crate::ws::actor;

/// GET /ws
/// Receiver endpoint. No payload or auth is needed to open it; once the
/// upgrade completes the connection joins the broadcast set until it closes.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    tracing::debug!(peer = %peer, "WebSocket upgrade requested");

    let actors = state.actors.clone();
    ws.on_upgrade(move |socket| {
        actors.track_future(async move {
            actor::run_connection(socket, state.connections, state.ws, state.shutdown).await;
        })
    })
}
