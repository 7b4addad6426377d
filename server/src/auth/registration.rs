use axum::{extract::State, http::StatusCode, Json};

use crate::auth::credentials::{credential_error_response, DeviceCredential};
use crate::state::AppState;

/// GET /register_device
/// Issue a fresh (device_uid, auth_token) pair valid for the configured TTL.
/// No auth required; rate limited per IP when enabled.
pub async fn register_device(
    State(state): State<AppState>,
) -> Result<Json<DeviceCredential>, (StatusCode, String)> {
    let credential = state
        .credentials
        .issue()
        .await
        .map_err(credential_error_response)?;

    tracing::info!(device_uid = %credential.device_uid, "Device registered");

    Ok(Json(credential))
}
