//! Charging plan entity
//!
//! A plan is an ordered sequence of time-phased power draws against one
//! station. Candidates are request-scoped; an accepted plan is promoted
//! into a reservation and its phases are committed to the site ledger.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::tariff::DemandTier;

/// Allowed drift between a plan's phase-energy sum and the requested
/// energy, in kWh.
pub const ENERGY_TOLERANCE_KWH: f64 = 0.01;

/// Optimization strategy requested by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Cost,
    Speed,
    Balanced,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cost => "cost",
            Self::Speed => "speed",
            Self::Balanced => "balanced",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One constant-power segment of a plan, contained in a single slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanPhase {
    pub start: DateTime<Utc>,
    pub duration_min: f64,
    pub power_kw: f64,
    pub energy_kwh: f64,
    pub price_eur_per_kwh: f64,
    pub tier: DemandTier,
}

impl PlanPhase {
    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::seconds((self.duration_min * 60.0).round() as i64)
    }
}

/// A time-phased charging schedule for one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingPlan {
    pub station_id: String,
    pub site_id: String,
    pub strategy: Strategy,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub energy_kwh: f64,
    pub energy_cost_eur: f64,
    pub session_fee_eur: f64,
    pub total_cost_eur: f64,
    pub phases: Vec<PlanPhase>,
}

impl ChargingPlan {
    /// Trivial zero-energy plan, returned when the battery is already at
    /// or above the target level.
    pub fn empty(
        station_id: impl Into<String>,
        site_id: impl Into<String>,
        strategy: Strategy,
        now: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            site_id: site_id.into(),
            strategy,
            created_at: now,
            deadline,
            start_time: now,
            end_time: now,
            energy_kwh: 0.0,
            energy_cost_eur: 0.0,
            session_fee_eur: 0.0,
            total_cost_eur: 0.0,
            phases: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn duration_minutes(&self) -> f64 {
        (self.end_time - self.start_time).num_seconds() as f64 / 60.0
    }

    /// Sum of energy across phases.
    pub fn phase_energy_kwh(&self) -> f64 {
        self.phases.iter().map(|p| p.energy_kwh).sum()
    }

    /// Highest phase power, in kW.
    pub fn peak_power_kw(&self) -> f64 {
        self.phases.iter().map(|p| p.power_kw).fold(0.0, f64::max)
    }

    /// Check the energy-conservation invariant against a required amount.
    pub fn delivers(&self, required_kwh: f64) -> bool {
        (self.phase_energy_kwh() - required_kwh).abs() <= ENERGY_TOLERANCE_KWH
    }

    /// Stable content hash used for anchoring, over the serialized plan.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        // Serialization of a plan is infallible: no maps, no non-string keys.
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }
}

// ── Tests ──────────────────────────────────────────────────────
