//! Broadcast endpoint: verify the publisher's credential, then fan the
//! symbol out to every open receiver.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::auth::credentials::{credential_error_response, CredentialError, CredentialService};
use crate::signal::{BroadcastMessage, Symbol};
use crate::state::AppState;
use crate::ws::ConnectionRegistry;

// --- Request/Response types for JSON API ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthInfo {
    pub device_uid: String,
    pub auth_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    pub auth: AuthInfo,
    pub symbol: Symbol,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub status: String,
}

/// Verify the credential and, only if it holds, broadcast `symbol`.
///
/// `Ok(())` means the broadcast was attempted against the full current
/// connection set; per-connection delivery failures are not reported.
pub async fn publish(
    credentials: &CredentialService,
    registry: &ConnectionRegistry,
    device_uid: &str,
    token: &str,
    symbol: Symbol,
) -> Result<(), CredentialError> {
    if let Err(err) = credentials.verify(device_uid, token).await {
        match &err {
            CredentialError::Unauthorized(reason) => {
                tracing::warn!(device_uid = %device_uid, reason = %reason, "Publish rejected");
            }
            CredentialError::StoreUnavailable(e) => {
                tracing::error!(device_uid = %device_uid, error = %e, "Publish failed: credential store unavailable");
            }
        }
        return Err(err);
    }

    registry.broadcast(&BroadcastMessage::from(symbol));

    tracing::info!(
        device_uid = %device_uid,
        symbol = %symbol,
        receivers = registry.len(),
        "Symbol broadcast"
    );
    Ok(())
}

/// POST /send_message
/// Body: { "auth": { "device_uid", "auth_token" }, "symbol": 0 | 1 | "DOT" | "DASH" }
pub async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    publish(
        &state.credentials,
        &state.connections,
        &req.auth.device_uid,
        &req.auth.auth_token,
        req.symbol,
    )
    .await
    .map_err(credential_error_response)?;

    Ok(Json(MessageResponse {
        status: "Message broadcasted".to_string(),
    }))
}
