//! Time-of-use tariff entity
//!
//! A tariff is an ordered price curve over the day. Lookups interpolate
//! linearly between defined points and wrap across midnight, so a price is
//! defined for every instant; out-of-range times clamp to the nearest
//! defined segment rather than failing.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

const MINUTES_PER_DAY: f64 = 1440.0;

/// Grid demand level attached to a tariff segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemandTier {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for DemandTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// One point of the daily price curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TariffPoint {
    /// Minute of day this segment starts at (0..1440).
    pub start_minute: u32,
    pub price_eur_per_kwh: f64,
    pub tier: DemandTier,
}

impl TariffPoint {
    pub fn new(start_minute: u32, price_eur_per_kwh: f64, tier: DemandTier) -> Self {
        Self {
            start_minute,
            price_eur_per_kwh,
            tier,
        }
    }
}

/// Daily time-of-use price curve for a station, read-only after load.
#[derive(Debug, Clone)]
pub struct TariffSchedule {
    pub id: String,
    pub name: String,
    pub currency: String,
    /// Flat activation fee added once per charging session.
    pub session_fee_eur: f64,
    points: Vec<TariffPoint>,
}

impl TariffSchedule {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        session_fee_eur: f64,
        mut points: Vec<TariffPoint>,
    ) -> Self {
        points.sort_by_key(|p| p.start_minute);
        Self {
            id: id.into(),
            name: name.into(),
            currency: "EUR".to_string(),
            session_fee_eur,
            points,
        }
    }

    /// Constant-price schedule.
    pub fn flat(
        id: impl Into<String>,
        name: impl Into<String>,
        session_fee_eur: f64,
        price_eur_per_kwh: f64,
        tier: DemandTier,
    ) -> Self {
        Self::new(
            id,
            name,
            session_fee_eur,
            vec![TariffPoint::new(0, price_eur_per_kwh, tier)],
        )
    }

    pub fn points(&self) -> &[TariffPoint] {
        &self.points
    }

    /// Price and demand tier at `t`.
    ///
    /// Interpolates linearly between the surrounding points; times before
    /// the first point or after the last wrap onto the overnight segment
    /// (last point → first point of the next day). Never fails: an empty
    /// curve prices at zero.
    pub fn price_at(&self, t: DateTime<Utc>) -> (f64, DemandTier) {
        if self.points.is_empty() {
            return (0.0, DemandTier::Low);
        }
        if self.points.len() == 1 {
            let p = self.points[0];
            return (p.price_eur_per_kwh, p.tier);
        }

        let minute = t.hour() as f64 * 60.0 + t.minute() as f64 + t.second() as f64 / 60.0;

        // Find the segment [points[i], points[i+1]) containing `minute`.
        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if minute >= a.start_minute as f64 && minute < b.start_minute as f64 {
                return (Self::lerp(a, minute, b.start_minute as f64, b.price_eur_per_kwh), a.tier);
            }
        }

        // Overnight wrap: last point of today → first point of tomorrow.
        let last = self.points[self.points.len() - 1];
        let first = self.points[0];
        let m = if minute >= last.start_minute as f64 {
            minute
        } else {
            minute + MINUTES_PER_DAY
        };
        (
            Self::lerp(
                last,
                m,
                first.start_minute as f64 + MINUTES_PER_DAY,
                first.price_eur_per_kwh,
            ),
            last.tier,
        )
    }

    /// Highest price on the curve. Used as the "original" reference price
    /// a plan is negotiated down from.
    pub fn peak_price(&self) -> f64 {
        self.points
            .iter()
            .map(|p| p.price_eur_per_kwh)
            .fold(0.0, f64::max)
    }

    fn lerp(a: TariffPoint, minute: f64, end_minute: f64, end_price: f64) -> f64 {
        let span = end_minute - a.start_minute as f64;
        if span <= 0.0 {
            return a.price_eur_per_kwh;
        }
        let frac = (minute - a.start_minute as f64) / span;
        a.price_eur_per_kwh + (end_price - a.price_eur_per_kwh) * frac
    }
}

// ── Tests ──────────────────────────────────────────────────────
