//! Domain error taxonomy
//!
//! Every failure a caller can act on gets its own variant; the HTTP layer
//! maps each one to a specific status and user-facing message.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures from plan construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    /// The requested deadline cannot be planned against at all
    /// (in the past, under the minimum lead time, or beyond the horizon).
    #[error("invalid deadline: {0}")]
    InvalidDeadline(String),

    /// Capacity and station power are physically insufficient to deliver
    /// the required energy before the deadline. Surfaced distinctly from
    /// input errors so the caller can offer an "extend deadline" flow.
    #[error(
        "cannot meet deadline {deadline}: {required_kwh:.2} kWh required, \
         only {deliverable_kwh:.2} kWh deliverable"
    )]
    InfeasibleDeadline {
        required_kwh: f64,
        deliverable_kwh: f64,
        deadline: DateTime<Utc>,
    },
}

/// Failures from candidate selection and plan negotiation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NegotiationError {
    #[error("invalid deadline: {0}")]
    InvalidDeadline(String),

    /// No stations inside the search radius. Not a planner failure;
    /// the caller should widen the radius.
    #[error("no charging stations within {radius_km:.1} km")]
    NoStationsInRange { radius_km: f64 },

    /// Every evaluated candidate failed plan construction. When all of
    /// them were deadline-infeasible, `suggested_deadline` carries the
    /// earliest deadline the best candidate could satisfy.
    #[error("no feasible plan across {candidates_evaluated} candidate stations")]
    NoFeasiblePlan {
        candidates_evaluated: usize,
        suggested_deadline: Option<DateTime<Utc>>,
    },
}

/// Failures from booking and reservation lifecycle operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BookingError {
    /// External trust establishment failed or timed out. Fatal to this
    /// attempt, never retried automatically.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Lost the connector race: no free connector at booking time.
    #[error("no available connector at station {0}")]
    NoAvailability(String),

    /// Lost the capacity race: a slot of this plan would push the site
    /// over its limit. The caller must re-negotiate.
    #[error("site {site_id} capacity exceeded at slot starting {slot_start}")]
    CapacityExceeded {
        site_id: String,
        slot_start: DateTime<Utc>,
    },

    #[error("station not found: {0}")]
    StationNotFound(String),

    #[error("reservation not found: {0}")]
    ReservationNotFound(String),

    /// Lifecycle transition not allowed from the reservation's current
    /// status (e.g. cancelling an already-cancelled reservation).
    #[error("reservation {id} is {status}: cannot {action}")]
    InvalidState {
        id: String,
        status: String,
        action: &'static str,
    },
}

/// Result type for plan construction.
pub type PlanResult<T> = Result<T, PlanError>;

/// Result type for booking operations.
pub type BookingResult<T> = Result<T, BookingError>;
