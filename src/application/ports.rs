//! Outbound ports to external collaborators
//!
//! Trust establishment and plan anchoring live outside this engine; both
//! are abstracted to a single async call each. These are the only
//! operations in a booking that may suspend.

use async_trait::async_trait;
use thiserror::Error;

/// Result of a successful driver/vehicle/charger authentication.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    pub auth_token: String,
    /// Price the operator quoted during the trust exchange, if any.
    pub pricing_quote_eur_per_kwh: Option<f64>,
}

/// Receipt from anchoring a plan hash.
#[derive(Debug, Clone)]
pub struct AnchorReceipt {
    pub anchor_id: String,
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("authentication rejected: {0}")]
    Rejected(String),
    #[error("authentication service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Error)]
pub enum AnchorError {
    #[error("anchor service unavailable: {0}")]
    Unavailable(String),
    #[error("anchor rejected: {0}")]
    Rejected(String),
}

impl AnchorError {
    /// Whether the out-of-band retry should keep trying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Establishes trust between driver, vehicle and charger, returning an
/// opaque session token.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(
        &self,
        driver_id: &str,
        vehicle_id: &str,
        station_id: &str,
    ) -> Result<AuthGrant, AuthError>;
}

/// Anchors a plan hash with an external trust anchor. Best-effort: a
/// failure here never blocks a booking.
#[async_trait]
pub trait PlanAnchor: Send + Sync {
    async fn anchor(&self, plan_hash: &str) -> Result<AnchorReceipt, AnchorError>;
}
