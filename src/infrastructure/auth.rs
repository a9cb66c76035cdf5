//! Demo authenticator
//!
//! Stands in for the external DID gateway that verifies driver, vehicle
//! and charger credentials. It accepts any well-formed identity triple
//! and mints an opaque session token; revoked identities can be listed
//! to exercise the rejection path.

use std::collections::HashSet;

use async_trait::async_trait;
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::application::ports::{AuthError, AuthGrant, Authenticator};

pub struct DemoAuthenticator {
    revoked: HashSet<String>,
}

impl DemoAuthenticator {
    pub fn new() -> Self {
        Self {
            revoked: HashSet::new(),
        }
    }

    /// Mark an identity (driver or vehicle) as revoked.
    pub fn revoke(mut self, id: impl Into<String>) -> Self {
        self.revoked.insert(id.into());
        self
    }

    fn mint_token(driver_id: &str, vehicle_id: &str, station_id: &str) -> String {
        let nonce: u64 = rand::thread_rng().gen();
        let mut hasher = Sha256::new();
        hasher.update(driver_id.as_bytes());
        hasher.update(vehicle_id.as_bytes());
        hasher.update(station_id.as_bytes());
        hasher.update(nonce.to_be_bytes());
        hex::encode(&hasher.finalize()[..16])
    }
}

impl Default for DemoAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authenticator for DemoAuthenticator {
    async fn authenticate(
        &self,
        driver_id: &str,
        vehicle_id: &str,
        station_id: &str,
    ) -> Result<AuthGrant, AuthError> {
        if driver_id.is_empty() || vehicle_id.is_empty() || station_id.is_empty() {
            return Err(AuthError::Rejected("missing identity".into()));
        }
        if self.revoked.contains(driver_id) || self.revoked.contains(vehicle_id) {
            return Err(AuthError::Rejected(format!(
                "credential revoked for {driver_id}"
            )));
        }

        let token = Self::mint_token(driver_id, vehicle_id, station_id);
        debug!(driver_id, vehicle_id, station_id, "Session authenticated");
        Ok(AuthGrant {
            auth_token: token,
            pricing_quote_eur_per_kwh: None,
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn grants_token_for_valid_triple() {
        let auth = DemoAuthenticator::new();
        let grant = auth
            .authenticate("did:drv:1", "VIN123", "st-01")
            .await
            .unwrap();
        assert_eq!(grant.auth_token.len(), 32);
    }

    #[tokio::test]
    async fn tokens_are_unique_per_session() {
        let auth = DemoAuthenticator::new();
        let a = auth.authenticate("did:drv:1", "VIN123", "st-01").await.unwrap();
        let b = auth.authenticate("did:drv:1", "VIN123", "st-01").await.unwrap();
        assert_ne!(a.auth_token, b.auth_token);
    }

    #[tokio::test]
    async fn rejects_empty_identity() {
        let auth = DemoAuthenticator::new();
        assert!(matches!(
            auth.authenticate("", "VIN123", "st-01").await,
            Err(AuthError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn rejects_revoked_identity() {
        let auth = DemoAuthenticator::new().revoke("VIN666");
        assert!(matches!(
            auth.authenticate("did:drv:1", "VIN666", "st-01").await,
            Err(AuthError::Rejected(_))
        ));
    }
}
