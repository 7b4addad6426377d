//! Device credential issuance and verification.
//!
//! A credential is a random `device_uid` paired with a random `auth_token`,
//! stored with a fixed TTL. Expiry is the only revocation: a device must
//! register again once its credential lapses.

use std::fmt;
use std::time::Duration;

use axum::http::StatusCode;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::store::{SharedStore, StoreError};

/// Lifetime of an issued credential (30 minutes).
pub const DEFAULT_CREDENTIAL_TTL: Duration = Duration::from_secs(1800);

/// Why a presented credential was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No live credential for this device (never issued, or expired).
    NotRegistered,
    /// A live credential exists but the token differs.
    TokenMismatch,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRegistered => "not_registered",
            Self::TokenMismatch => "token_mismatch",
        }
    }

    /// Human-readable message returned to HTTP callers.
    pub fn detail(&self) -> &'static str {
        match self {
            Self::NotRegistered => "Device not registered",
            Self::TokenMismatch => "Invalid auth token",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
    #[error("unauthorized: {0}")]
    Unauthorized(RejectReason),
}

/// Map a credential failure to an HTTP status and message.
/// Both rejection reasons are 401; the message tells them apart.
pub fn credential_error_response(err: CredentialError) -> (StatusCode, String) {
    match err {
        CredentialError::Unauthorized(reason) => {
            (StatusCode::UNAUTHORIZED, reason.detail().to_string())
        }
        CredentialError::StoreUnavailable(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Credential store unavailable".to_string(),
        ),
    }
}

/// A freshly issued device credential. The token is only ever seen here;
/// the store keeps its SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCredential {
    pub device_uid: String,
    pub auth_token: String,
}

/// Issues and verifies device credentials against a [`CredentialStore`](crate::store::CredentialStore).
#[derive(Clone)]
pub struct CredentialService {
    store: SharedStore,
    ttl: Duration,
}

impl CredentialService {
    pub fn new(store: SharedStore, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a new device credential and store it for `ttl`.
    pub async fn issue(&self) -> Result<DeviceCredential, CredentialError> {
        let device_uid = Uuid::new_v4().to_string();
        let auth_token = generate_token();

        self.store
            .set(&device_uid, &hash_token(&auth_token), self.ttl)
            .await?;

        tracing::debug!(
            device_uid = %device_uid,
            ttl_secs = self.ttl.as_secs(),
            "Device credential issued"
        );

        Ok(DeviceCredential {
            device_uid,
            auth_token,
        })
    }

    /// Check a presented (device, token) pair. Read-only: never touches the TTL.
    pub async fn verify(&self, device_uid: &str, token: &str) -> Result<(), CredentialError> {
        let stored = self
            .store
            .get(device_uid)
            .await?
            .ok_or(CredentialError::Unauthorized(RejectReason::NotRegistered))?;

        let presented = hash_token(token);
        if !constant_time_eq(stored.as_bytes(), presented.as_bytes()) {
            return Err(CredentialError::Unauthorized(RejectReason::TokenMismatch));
        }

        Ok(())
    }
}

/// Random 256-bit token, hex-encoded (64 chars).
fn generate_token() -> String {
    let token_bytes: [u8; 32] = rand::rng().random();
    hex::encode(token_bytes)
}

/// SHA-256 hash of a token for storage comparison.
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CredentialStore, MemoryStore};
    use async_trait::async_trait;
    use std::sync::Arc;

    fn service_with_store() -> (CredentialService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = CredentialService::new(store.clone(), DEFAULT_CREDENTIAL_TTL);
        (service, store)
    }

    /// Store whose backend is always down.
    struct UnreachableStore;

    #[async_trait]
    impl CredentialStore for UnreachableStore {
        async fn set(&self, _: &str, _: &str, _: Duration) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }

        async fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }

        async fn purge_expired(&self) -> Result<usize, StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_issue_then_verify_succeeds() {
        let (service, _store) = service_with_store();
        let credential = service.issue().await.unwrap();

        assert!(service
            .verify(&credential.device_uid, &credential.auth_token)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_issued_values_are_unique() {
        let (service, _store) = service_with_store();
        let a = service.issue().await.unwrap();
        let b = service.issue().await.unwrap();

        assert_ne!(a.device_uid, b.device_uid);
        assert_ne!(a.auth_token, b.auth_token);
        assert_eq!(a.auth_token.len(), 64);
    }

    #[tokio::test]
    async fn test_wrong_token_is_mismatch() {
        let (service, _store) = service_with_store();
        let credential = service.issue().await.unwrap();

        let err = service
            .verify(&credential.device_uid, "not-the-token")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CredentialError::Unauthorized(RejectReason::TokenMismatch)
        ));
    }

    #[tokio::test]
    async fn test_token_comparison_is_exact() {
        let (service, _store) = service_with_store();
        let credential = service.issue().await.unwrap();

        let upper = credential.auth_token.to_uppercase();
        let padded = format!(" {}", credential.auth_token);
        for candidate in [upper, padded] {
            assert!(matches!(
                service.verify(&credential.device_uid, &candidate).await,
                Err(CredentialError::Unauthorized(RejectReason::TokenMismatch))
            ));
        }
    }

    #[tokio::test]
    async fn test_unknown_device_is_not_registered() {
        let (service, _store) = service_with_store();

        let err = service.verify("no-such-device", "token").await.unwrap_err();
        assert!(matches!(
            err,
            CredentialError::Unauthorized(RejectReason::NotRegistered)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_credential_is_not_registered() {
        let (service, _store) = service_with_store();
        let credential = service.issue().await.unwrap();

        tokio::time::advance(DEFAULT_CREDENTIAL_TTL).await;

        let err = service
            .verify(&credential.device_uid, &credential.auth_token)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CredentialError::Unauthorized(RejectReason::NotRegistered)
        ));
    }

    #[tokio::test]
    async fn test_store_holds_digest_not_plaintext() {
        let (service, store) = service_with_store();
        let credential = service.issue().await.unwrap();

        let stored = store.get(&credential.device_uid).await.unwrap().unwrap();
        assert_ne!(stored, credential.auth_token);
        assert_eq!(stored, hash_token(&credential.auth_token));
    }

    #[tokio::test]
    async fn test_overwritten_credential_invalidates_old_token() {
        let (service, store) = service_with_store();
        let credential = service.issue().await.unwrap();

        store
            .set(
                &credential.device_uid,
                &hash_token("replacement"),
                DEFAULT_CREDENTIAL_TTL,
            )
            .await
            .unwrap();

        assert!(matches!(
            service
                .verify(&credential.device_uid, &credential.auth_token)
                .await,
            Err(CredentialError::Unauthorized(RejectReason::TokenMismatch))
        ));
        assert!(service
            .verify(&credential.device_uid, "replacement")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_store_surfaces_store_unavailable() {
        let service = CredentialService::new(Arc::new(UnreachableStore), DEFAULT_CREDENTIAL_TTL);

        assert!(matches!(
            service.issue().await,
            Err(CredentialError::StoreUnavailable(_))
        ));
        assert!(matches!(
            service.verify("device", "token").await,
            Err(CredentialError::StoreUnavailable(_))
        ));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    #[test]
    fn test_credential_error_response_mapping() {
        let (status, body) = credential_error_response(CredentialError::Unauthorized(
            RejectReason::NotRegistered,
        ));
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "Device not registered");

        let (status, body) = credential_error_response(CredentialError::Unauthorized(
            RejectReason::TokenMismatch,
        ));
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "Invalid auth token");

        let (status, _) = credential_error_response(CredentialError::StoreUnavailable(
            StoreError::Backend("down".into()),
        ));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
