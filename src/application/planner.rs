//! Phased charging plan construction
//!
//! Discretizes the window from now to the deadline into fixed-width
//! slots, bounds each slot by `min(station ceiling, free site capacity)`,
//! and fills slots greedily in a strategy-dependent order. The first and
//! last active slots are capped to a fraction of the station ceiling so
//! the schedule ramps up and tapers off instead of stepping to full
//! power; the caps are lifted only when they alone would prevent an
//! otherwise feasible request from completing by the deadline.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{
    ChargingPlan, PlanError, PlanPhase, PlanResult, SlotClock, Station, Strategy, TariffSchedule,
};

const ENERGY_EPSILON_KWH: f64 = 1e-6;
const POWER_EPSILON_KW: f64 = 1e-6;

/// Tunable planner parameters. The defaults mirror the product's demo
/// configuration; all of them come from `AppConfig` in the running
/// service.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Slot width used for capacity accounting and plan phases.
    pub slot_minutes: u32,
    /// First/last active slot power cap, as a fraction of the station
    /// ceiling.
    pub ramp_fraction: f64,
    /// Minimum lead time between request and deadline.
    pub min_lead_minutes: i64,
    /// Maximum planning horizon.
    pub max_horizon_hours: i64,
    /// Weight of the tariff price in the balanced slot ordering.
    pub balanced_price_weight: f64,
    /// Weight of the available power in the balanced slot ordering.
    pub balanced_power_weight: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            slot_minutes: 15,
            ramp_fraction: 0.5,
            min_lead_minutes: 5,
            max_horizon_hours: 12,
            balanced_price_weight: 1.0,
            balanced_power_weight: 0.02,
        }
    }
}

/// One plannable slot of the request window.
#[derive(Debug, Clone)]
struct Slot {
    start: DateTime<Utc>,
    duration_h: f64,
    available_kw: f64,
    price_eur_per_kwh: f64,
    tier: crate::domain::DemandTier,
}

#[derive(Debug, Clone, Copy, Default)]
struct SlotAlloc {
    energy_kwh: f64,
    power_kw: f64,
}

/// Builds feasible power curves against a capacity snapshot.
pub struct PlanBuilder {
    cfg: PlannerConfig,
    clock: SlotClock,
}

impl PlanBuilder {
    pub fn new(cfg: PlannerConfig) -> Self {
        let clock = SlotClock::new(cfg.slot_minutes);
        Self { cfg, clock }
    }

    pub fn clock(&self) -> SlotClock {
        self.clock
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.cfg
    }

    /// First slot index and slot count covering `[now, deadline)`.
    /// The caller snapshots free capacity for exactly this span.
    pub fn slot_span(&self, now: DateTime<Utc>, deadline: DateTime<Utc>) -> (i64, usize) {
        let first = self.clock.index_of(now);
        if deadline <= now {
            return (first, 0);
        }
        let mut last = self.clock.index_of(deadline);
        if self.clock.start_of(last) == deadline {
            last -= 1;
        }
        (first, (last - first + 1).max(0) as usize)
    }

    /// Construct a plan delivering `energy_needed_kwh` at `station`
    /// before `deadline`, against the given per-slot free capacity.
    ///
    /// `free_capacity_kw[i]` is the site's free capacity for the i-th
    /// slot of `slot_span(now, deadline)`.
    pub fn build(
        &self,
        station: &Station,
        tariff: &TariffSchedule,
        free_capacity_kw: &[f64],
        now: DateTime<Utc>,
        deadline: DateTime<Utc>,
        energy_needed_kwh: f64,
        strategy: Strategy,
    ) -> PlanResult<ChargingPlan> {
        self.validate_deadline(now, deadline)?;

        if energy_needed_kwh <= ENERGY_EPSILON_KWH {
            return Ok(ChargingPlan::empty(
                &station.id,
                &station.site_id,
                strategy,
                now,
                deadline,
            ));
        }

        let slots = self.build_slots(station, tariff, free_capacity_kw, now, deadline);

        let deliverable_kwh: f64 = slots.iter().map(|s| s.available_kw * s.duration_h).sum();
        if deliverable_kwh + ENERGY_EPSILON_KWH < energy_needed_kwh {
            return Err(PlanError::InfeasibleDeadline {
                required_kwh: energy_needed_kwh,
                deliverable_kwh,
                deadline,
            });
        }

        let order = self.allocation_order(&slots, strategy);
        let alloc = self.allocate_with_ramp(&slots, &order, energy_needed_kwh, station.max_power_kw);

        Ok(self.assemble(station, tariff, strategy, now, deadline, &slots, &alloc))
    }

    fn validate_deadline(&self, now: DateTime<Utc>, deadline: DateTime<Utc>) -> PlanResult<()> {
        if deadline <= now {
            return Err(PlanError::InvalidDeadline("deadline is in the past".into()));
        }
        let lead = deadline - now;
        if lead < Duration::minutes(self.cfg.min_lead_minutes) {
            return Err(PlanError::InvalidDeadline(format!(
                "deadline must be at least {} minutes away",
                self.cfg.min_lead_minutes
            )));
        }
        if lead > Duration::hours(self.cfg.max_horizon_hours) {
            return Err(PlanError::InvalidDeadline(format!(
                "deadline must be within the next {} hours",
                self.cfg.max_horizon_hours
            )));
        }
        Ok(())
    }

    fn build_slots(
        &self,
        station: &Station,
        tariff: &TariffSchedule,
        free_capacity_kw: &[f64],
        now: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> Vec<Slot> {
        let (first, count) = self.slot_span(now, deadline);
        let mut slots = Vec::with_capacity(count);

        for offset in 0..count as i64 {
            let index = first + offset;
            let start = self.clock.start_of(index).max(now);
            let end = self.clock.end_of(index).min(deadline);
            let duration_h = (end - start).num_seconds() as f64 / 3600.0;
            if duration_h <= 0.0 {
                continue;
            }

            let free = free_capacity_kw
                .get(offset as usize)
                .copied()
                .unwrap_or(0.0);
            let (price_eur_per_kwh, tier) = tariff.price_at(start);

            slots.push(Slot {
                start,
                duration_h,
                available_kw: station.max_power_kw.min(free).max(0.0),
                price_eur_per_kwh,
                tier,
            });
        }
        slots
    }

    /// Slot fill order for a strategy.
    ///
    /// Speed front-loads; cost fills cheapest first, breaking price ties
    /// from the deadline backward; balanced trades price against
    /// available power.
    fn allocation_order(&self, slots: &[Slot], strategy: Strategy) -> Vec<usize> {
        let mut order: Vec<usize> = (0..slots.len()).collect();
        match strategy {
            Strategy::Speed => {}
            Strategy::Cost => {
                order.sort_by(|&a, &b| {
                    slots[a]
                        .price_eur_per_kwh
                        .total_cmp(&slots[b].price_eur_per_kwh)
                        .then_with(|| b.cmp(&a))
                });
            }
            Strategy::Balanced => {
                let weight = |i: usize| {
                    slots[i].price_eur_per_kwh * self.cfg.balanced_price_weight
                        - slots[i].available_kw * self.cfg.balanced_power_weight
                };
                order.sort_by(|&a, &b| weight(a).total_cmp(&weight(b)).then_with(|| a.cmp(&b)));
            }
        }
        order
    }

    /// Greedy fill with ramp/taper caps on the first and last active
    /// slot. The active boundary depends on the allocation, so re-run
    /// until it is stable; single-slot plans are exempt. If the caps
    /// leave energy unplaced the request was only feasible at full
    /// power, so they are lifted and the deadline guarantee wins.
    fn allocate_with_ramp(
        &self,
        slots: &[Slot],
        order: &[usize],
        energy_kwh: f64,
        ceiling_kw: f64,
    ) -> Vec<SlotAlloc> {
        let ramp_cap_kw = ceiling_kw * self.cfg.ramp_fraction;
        let mut caps: Option<(usize, usize)> = None;
        let mut alloc = Vec::new();

        for _ in 0..=slots.len() {
            alloc = self.allocate(slots, order, energy_kwh, caps, ramp_cap_kw);

            let placed: f64 = alloc.iter().map(|a| a.energy_kwh).sum();
            if energy_kwh - placed > ENERGY_EPSILON_KWH {
                return self.allocate(slots, order, energy_kwh, None, ramp_cap_kw);
            }

            let active: Vec<usize> = (0..slots.len())
                .filter(|&i| alloc[i].energy_kwh > ENERGY_EPSILON_KWH)
                .collect();
            let bounds = match (active.first(), active.last()) {
                (Some(&first), Some(&last)) if first != last => (first, last),
                _ => break,
            };
            if caps == Some(bounds) {
                break;
            }
            caps = Some(bounds);
        }
        alloc
    }

    fn allocate(
        &self,
        slots: &[Slot],
        order: &[usize],
        energy_kwh: f64,
        caps: Option<(usize, usize)>,
        ramp_cap_kw: f64,
    ) -> Vec<SlotAlloc> {
        let mut alloc = vec![SlotAlloc::default(); slots.len()];
        let mut remaining = energy_kwh;

        for &i in order {
            if remaining <= ENERGY_EPSILON_KWH {
                break;
            }
            let slot = &slots[i];
            let mut power = slot.available_kw;
            if let Some((first, last)) = caps {
                if i == first || i == last {
                    power = power.min(ramp_cap_kw);
                }
            }
            if power <= POWER_EPSILON_KW {
                continue;
            }
            let energy = (power * slot.duration_h).min(remaining);
            if energy <= ENERGY_EPSILON_KWH {
                continue;
            }
            alloc[i] = SlotAlloc {
                energy_kwh: energy,
                power_kw: power,
            };
            remaining -= energy;
        }
        alloc
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        station: &Station,
        tariff: &TariffSchedule,
        strategy: Strategy,
        now: DateTime<Utc>,
        deadline: DateTime<Utc>,
        slots: &[Slot],
        alloc: &[SlotAlloc],
    ) -> ChargingPlan {
        let mut phases = Vec::new();
        let mut energy_kwh = 0.0;
        let mut energy_cost_eur = 0.0;

        for (slot, a) in slots.iter().zip(alloc) {
            if a.energy_kwh <= ENERGY_EPSILON_KWH {
                continue;
            }
            // A partially-filled slot runs at its allocation power for
            // only the time it needs.
            let duration_min = (a.energy_kwh / a.power_kw * 60.0).min(slot.duration_h * 60.0);
            phases.push(PlanPhase {
                start: slot.start,
                duration_min,
                power_kw: a.power_kw,
                energy_kwh: a.energy_kwh,
                price_eur_per_kwh: slot.price_eur_per_kwh,
                tier: slot.tier,
            });
            energy_kwh += a.energy_kwh;
            energy_cost_eur += a.energy_kwh * slot.price_eur_per_kwh;
        }

        let start_time = phases.first().map(|p| p.start).unwrap_or(now);
        let end_time = phases.last().map(|p| p.end()).unwrap_or(now);
        let session_fee_eur = if phases.is_empty() {
            0.0
        } else {
            tariff.session_fee_eur
        };

        ChargingPlan {
            station_id: station.id.clone(),
            site_id: station.site_id.clone(),
            strategy,
            created_at: now,
            deadline,
            start_time,
            end_time,
            energy_kwh,
            energy_cost_eur,
            session_fee_eur,
            total_cost_eur: energy_cost_eur + session_fee_eur,
            phases,
        }
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new(PlannerConfig::default())
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Connector, DemandTier, GeoPoint, PlugType, TariffPoint};
    use chrono::TimeZone;

    fn station(max_power_kw: f64) -> Station {
        Station {
            id: "st-01".into(),
            name: "Test Hub".into(),
            operator: "Test Ops".into(),
            site_id: "site-01".into(),
            location: GeoPoint::new(60.17, 24.94),
            address: None,
            city: None,
            max_power_kw,
            tariff_id: "t-flat".into(),
            connectors: vec![Connector::new("c-1", PlugType::Ccs2, max_power_kw)],
        }
    }

    fn flat_tariff() -> TariffSchedule {
        TariffSchedule::flat("t-flat", "Flat", 0.75, 0.34, DemandTier::Medium)
    }

    fn at_10() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()
    }

    fn builder() -> PlanBuilder {
        PlanBuilder::new(PlannerConfig::default())
    }

    fn abundant(count: usize) -> Vec<f64> {
        vec![1000.0; count]
    }

    #[test]
    fn slot_span_counts_partial_slots() {
        let b = builder();
        let now = at_10();
        let (_, count) = b.slot_span(now, now + Duration::hours(4));
        assert_eq!(count, 16);

        let (_, short) = b.slot_span(now, now + Duration::minutes(10));
        assert_eq!(short, 1);

        let (_, offset) = b.slot_span(now + Duration::minutes(7), now + Duration::hours(1));
        assert_eq!(offset, 4);
    }

    #[test]
    fn speed_plan_ramps_and_delivers_24kwh() {
        // 40 → 80 % of a 60 kWh pack at an 11 kW station, 4 h window.
        let b = builder();
        let now = at_10();
        let deadline = now + Duration::hours(4);
        let (_, count) = b.slot_span(now, deadline);

        let plan = b
            .build(
                &station(11.0),
                &flat_tariff(),
                &abundant(count),
                now,
                deadline,
                24.0,
                Strategy::Speed,
            )
            .unwrap();

        assert!(plan.delivers(24.0));
        assert!(plan.end_time <= deadline);

        // Ramp-up and taper at half the ceiling; full power in between.
        assert_eq!(plan.phases.first().unwrap().power_kw, 5.5);
        assert_eq!(plan.phases.last().unwrap().power_kw, 5.5);
        assert!(plan.phases[1..plan.phases.len() - 1]
            .iter()
            .all(|p| p.power_kw == 11.0));

        // 9 full slots plus a 6.8-minute taper; ~11 minutes over the
        // un-ramped ideal of ceil(24/11*60) = 131 min.
        assert!((plan.duration_minutes() - 141.8).abs() < 0.5, "got {}", plan.duration_minutes());
    }

    #[test]
    fn constrained_site_reduces_power_and_stretches_plan() {
        // Site free capacity capped at 5 kW for the first 2 h, 11 kW after.
        let b = builder();
        let now = at_10();
        let deadline = now + Duration::hours(4);
        let (_, count) = b.slot_span(now, deadline);
        let mut free = vec![11.0; count];
        for f in free.iter_mut().take(8) {
            *f = 5.0;
        }

        let plan = b
            .build(
                &station(11.0),
                &flat_tariff(),
                &free,
                now,
                deadline,
                24.0,
                Strategy::Speed,
            )
            .unwrap();

        assert!(plan.delivers(24.0));
        assert!(plan.end_time <= deadline);
        // First two hours limited by the site, not the station.
        assert!(plan.phases[..8].iter().all(|p| p.power_kw <= 5.0));
        // The plan reaches past the constrained window instead of failing.
        assert!(plan.end_time > now + Duration::hours(2));
    }

    #[test]
    fn ten_minute_deadline_for_20kwh_is_infeasible() {
        let b = builder();
        let now = at_10();
        let deadline = now + Duration::minutes(10);
        let (_, count) = b.slot_span(now, deadline);

        let err = b
            .build(
                &station(11.0),
                &flat_tariff(),
                &abundant(count),
                now,
                deadline,
                20.0,
                Strategy::Speed,
            )
            .unwrap_err();

        match err {
            PlanError::InfeasibleDeadline {
                required_kwh,
                deliverable_kwh,
                ..
            } => {
                assert_eq!(required_kwh, 20.0);
                assert!((deliverable_kwh - 11.0 / 6.0).abs() < 0.01);
            }
            other => panic!("expected InfeasibleDeadline, got {other:?}"),
        }
    }

    #[test]
    fn zero_energy_yields_trivial_plan() {
        let b = builder();
        let now = at_10();
        let plan = b
            .build(
                &station(11.0),
                &flat_tariff(),
                &abundant(8),
                now,
                now + Duration::hours(2),
                0.0,
                Strategy::Cost,
            )
            .unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.total_cost_eur, 0.0);
    }

    #[test]
    fn past_and_short_and_far_deadlines_are_invalid() {
        let b = builder();
        let now = at_10();
        let st = station(11.0);
        let t = flat_tariff();

        for deadline in [
            now - Duration::hours(1),
            now + Duration::minutes(3),
            now + Duration::hours(13),
        ] {
            let err = b
                .build(&st, &t, &abundant(4), now, deadline, 10.0, Strategy::Speed)
                .unwrap_err();
            assert!(matches!(err, PlanError::InvalidDeadline(_)), "{deadline}");
        }
    }

    fn valley_tariff() -> TariffSchedule {
        // Expensive day, cheap valley starting at 10:00, expensive again
        // from 11:00.
        TariffSchedule::new(
            "t-valley",
            "Valley",
            0.75,
            vec![
                TariffPoint::new(0, 0.40, DemandTier::High),
                TariffPoint::new(600, 0.10, DemandTier::Low),
                TariffPoint::new(660, 0.40, DemandTier::High),
            ],
        )
    }

    #[test]
    fn cost_strategy_prefers_cheap_slots_and_undercuts_speed() {
        let b = builder();
        let now = at_10();
        let deadline = now + Duration::hours(3);
        let (_, count) = b.slot_span(now, deadline);
        let st = station(11.0);
        let tariff = valley_tariff();

        let cost_plan = b
            .build(&st, &tariff, &abundant(count), now, deadline, 8.0, Strategy::Cost)
            .unwrap();
        let speed_plan = b
            .build(&st, &tariff, &abundant(count), now, deadline, 8.0, Strategy::Speed)
            .unwrap();

        assert!(cost_plan.delivers(8.0));
        assert!(speed_plan.delivers(8.0));
        assert!(cost_plan.total_cost_eur <= speed_plan.total_cost_eur);

        // Everything lands inside or right after the valley, well before
        // the expensive evening slots.
        let valley_end = at_10() + Duration::hours(1);
        assert!(cost_plan
            .phases
            .iter()
            .all(|p| p.start <= valley_end));
    }

    #[test]
    fn balanced_strategy_is_feasible_and_bounded() {
        let b = builder();
        let now = at_10();
        let deadline = now + Duration::hours(3);
        let (_, count) = b.slot_span(now, deadline);
        let free = vec![9.0; count];

        let plan = b
            .build(
                &station(11.0),
                &valley_tariff(),
                &free,
                now,
                deadline,
                12.0,
                Strategy::Balanced,
            )
            .unwrap();

        assert!(plan.delivers(12.0));
        assert!(plan.end_time <= deadline);
        for phase in &plan.phases {
            assert!(phase.power_kw <= 9.0 + 1e-9);
        }
    }

    #[test]
    fn phase_power_never_exceeds_ceiling_or_free_capacity() {
        let b = builder();
        let now = at_10();
        let deadline = now + Duration::hours(4);
        let (_, count) = b.slot_span(now, deadline);
        let free: Vec<f64> = (0..count).map(|i| 3.0 + (i % 5) as f64 * 2.5).collect();

        for strategy in [Strategy::Cost, Strategy::Speed, Strategy::Balanced] {
            let plan = b
                .build(
                    &station(8.0),
                    &valley_tariff(),
                    &free,
                    now,
                    deadline,
                    10.0,
                    strategy,
                )
                .unwrap();
            assert!(plan.delivers(10.0));

            let clock = b.clock();
            let first_slot = clock.index_of(now);
            for phase in &plan.phases {
                let offset = (clock.index_of(phase.start) - first_slot) as usize;
                assert!(phase.power_kw <= 8.0 + 1e-9);
                assert!(phase.power_kw <= free[offset] + 1e-9);
            }
        }
    }

    #[test]
    fn ramp_caps_are_lifted_when_they_block_a_feasible_plan() {
        // Exactly fills the window at full power: with 50% caps on the
        // edge slots the energy cannot fit, so the caps must yield.
        let b = builder();
        let now = at_10();
        let deadline = now + Duration::hours(1);
        let (_, count) = b.slot_span(now, deadline);

        let plan = b
            .build(
                &station(10.0),
                &flat_tariff(),
                &abundant(count),
                now,
                deadline,
                10.0,
                Strategy::Speed,
            )
            .unwrap();

        assert!(plan.delivers(10.0));
        assert!(plan.end_time <= deadline);
        assert_eq!(plan.phases.iter().map(|p| p.power_kw).fold(0.0, f64::max), 10.0);
    }
}
