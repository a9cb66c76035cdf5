//! Reservation domain entity
//!
//! The reservation state machine lives here, server-side, once. Failure
//! of any booking step before `Booked` leaves no reservation behind; the
//! later transitions guard themselves and reject anything else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::BookingError;
use super::plan::ChargingPlan;
use super::station::PlugType;

/// Reservation lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Capacity committed and connector reserved, charging not started.
    Booked,
    /// Charging session in progress.
    Active,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Booked => "booked",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A capacity-reserved booking of an accepted plan.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub id: String,
    pub plan: ChargingPlan,
    pub station_id: String,
    pub connector_id: String,
    pub plug: PlugType,
    pub driver_id: String,
    pub vehicle_id: String,
    pub auth_token: String,
    pub current_soc_percent: f64,
    pub target_soc_percent: f64,
    pub status: ReservationStatus,
    /// Receipt from the anchoring service; `None` while anchoring is
    /// deferred to the out-of-band retry.
    pub anchor_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        plan: ChargingPlan,
        connector_id: impl Into<String>,
        plug: PlugType,
        driver_id: impl Into<String>,
        vehicle_id: impl Into<String>,
        auth_token: impl Into<String>,
        current_soc_percent: f64,
        target_soc_percent: f64,
        anchor_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        let station_id = plan.station_id.clone();
        Self {
            id: id.into(),
            plan,
            station_id,
            connector_id: connector_id.into(),
            plug,
            driver_id: driver_id.into(),
            vehicle_id: vehicle_id.into(),
            auth_token: auth_token.into(),
            current_soc_percent,
            target_soc_percent,
            status: ReservationStatus::Booked,
            anchor_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_anchored(&self) -> bool {
        self.anchor_id.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            ReservationStatus::Completed | ReservationStatus::Cancelled
        )
    }

    /// Booked → Active, when charging begins.
    pub fn start(&mut self) -> Result<(), BookingError> {
        match self.status {
            ReservationStatus::Booked => {
                self.status = ReservationStatus::Active;
                self.updated_at = Utc::now();
                Ok(())
            }
            other => Err(self.invalid_state(other, "start")),
        }
    }

    /// Booked | Active → Completed.
    pub fn complete(&mut self) -> Result<(), BookingError> {
        match self.status {
            ReservationStatus::Booked | ReservationStatus::Active => {
                self.status = ReservationStatus::Completed;
                self.updated_at = Utc::now();
                Ok(())
            }
            other => Err(self.invalid_state(other, "complete")),
        }
    }

    /// Booked | Active → Cancelled.
    pub fn cancel(&mut self) -> Result<(), BookingError> {
        match self.status {
            ReservationStatus::Booked | ReservationStatus::Active => {
                self.status = ReservationStatus::Cancelled;
                self.updated_at = Utc::now();
                Ok(())
            }
            other => Err(self.invalid_state(other, "cancel")),
        }
    }

    fn invalid_state(&self, status: ReservationStatus, action: &'static str) -> BookingError {
        BookingError::InvalidState {
            id: self.id.clone(),
            status: status.to_string(),
            action,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────
