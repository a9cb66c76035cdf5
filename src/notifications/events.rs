//! Event types broadcast to UI subscribers
//!
//! The reservation state machine is server-side only; clients observe it
//! through these events instead of keeping their own copy.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::Strategy;

/// Events published on the bus.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    PlanNegotiated {
        station_id: String,
        strategy: Strategy,
        match_score: u8,
        total_cost_eur: f64,
    },
    ReservationBooked {
        reservation_id: String,
        station_id: String,
        connector_id: String,
    },
    ChargingStarted {
        reservation_id: String,
        station_id: String,
    },
    ReservationCompleted {
        reservation_id: String,
        energy_kwh: f64,
    },
    ReservationCancelled {
        reservation_id: String,
    },
    PlanAnchored {
        reservation_id: String,
        anchor_id: String,
    },
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PlanNegotiated { .. } => "plan_negotiated",
            Self::ReservationBooked { .. } => "reservation_booked",
            Self::ChargingStarted { .. } => "charging_started",
            Self::ReservationCompleted { .. } => "reservation_completed",
            Self::ReservationCancelled { .. } => "reservation_cancelled",
            Self::PlanAnchored { .. } => "plan_anchored",
        }
    }

    pub fn reservation_id(&self) -> Option<&str> {
        match self {
            Self::ReservationBooked { reservation_id, .. }
            | Self::ChargingStarted { reservation_id, .. }
            | Self::ReservationCompleted { reservation_id, .. }
            | Self::ReservationCancelled { reservation_id }
            | Self::PlanAnchored { reservation_id, .. } => Some(reservation_id),
            Self::PlanNegotiated { .. } => None,
        }
    }
}

/// An event with its publication timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct EventMessage {
    pub event: Event,
    pub timestamp: DateTime<Utc>,
}

impl EventMessage {
    pub fn new(event: Event) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────
