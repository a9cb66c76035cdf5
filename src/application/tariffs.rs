//! Tariff book — registry of per-station price curves

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::domain::{DemandTier, TariffSchedule};

/// Fallback rate when a station references an unknown tariff.
/// Matches the fast-DC tier of the default pricing table.
const FALLBACK_RATE_EUR_PER_KWH: f64 = 0.34;
const FALLBACK_SESSION_FEE_EUR: f64 = 0.75;

/// In-memory registry of tariff schedules, loaded once and read-only
/// afterwards. Lookups never fail: an unknown tariff id clamps to the
/// fallback rate so pricing always produces a number.
pub struct TariffBook {
    tariffs: DashMap<String, TariffSchedule>,
}

/// Shared, reference-counted tariff book
pub type SharedTariffBook = Arc<TariffBook>;

impl TariffBook {
    pub fn new() -> Self {
        Self {
            tariffs: DashMap::new(),
        }
    }

    pub fn shared() -> SharedTariffBook {
        Arc::new(Self::new())
    }

    pub fn insert(&self, tariff: TariffSchedule) {
        self.tariffs.insert(tariff.id.clone(), tariff);
    }

    pub fn get(&self, tariff_id: &str) -> Option<TariffSchedule> {
        self.tariffs.get(tariff_id).map(|t| t.clone())
    }

    /// Price and demand tier for a tariff at `t`.
    pub fn price_at(&self, tariff_id: &str, t: DateTime<Utc>) -> (f64, DemandTier) {
        match self.tariffs.get(tariff_id) {
            Some(tariff) => tariff.price_at(t),
            None => (FALLBACK_RATE_EUR_PER_KWH, DemandTier::Medium),
        }
    }

    pub fn session_fee(&self, tariff_id: &str) -> f64 {
        self.tariffs
            .get(tariff_id)
            .map(|t| t.session_fee_eur)
            .unwrap_or(FALLBACK_SESSION_FEE_EUR)
    }

    /// Resolve a tariff, substituting a flat fallback schedule for
    /// unknown ids.
    pub fn resolve(&self, tariff_id: &str) -> TariffSchedule {
        self.get(tariff_id).unwrap_or_else(|| {
            TariffSchedule::flat(
                tariff_id,
                "Fallback",
                FALLBACK_SESSION_FEE_EUR,
                FALLBACK_RATE_EUR_PER_KWH,
                DemandTier::Medium,
            )
        })
    }

    pub fn count(&self) -> usize {
        self.tariffs.len()
    }
}

impl Default for TariffBook {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────────
