//! Charging plan negotiation
//!
//! Pure computation over catalog/tariff/ledger snapshots: scores nearby
//! stations, runs the plan builder against the top candidates, prices
//! each plan and picks the winner for the requested strategy. Nothing is
//! mutated here: capacity is only committed at booking time, which
//! re-validates against the live ledger.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::application::capacity::SharedCapacityLedger;
use crate::application::catalog::SharedStationCatalog;
use crate::application::planner::PlanBuilder;
use crate::application::tariffs::SharedTariffBook;
use crate::domain::{
    ChargingPlan, GeoPoint, NegotiationError, PlanError, Station, Strategy,
};

/// Tunable negotiation parameters.
#[derive(Debug, Clone)]
pub struct NegotiatorConfig {
    /// How many top-scored candidates get a full plan evaluation.
    pub top_k: usize,
    pub search_radius_km: f64,
    /// Battery capacity assumed when the request does not carry one.
    pub default_battery_capacity_kwh: f64,
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            search_radius_km: 50.0,
            default_battery_capacity_kwh: 60.0,
        }
    }
}

/// A driver's request for a charging recommendation. Request-scoped:
/// discarded once a plan is returned or booked.
#[derive(Debug, Clone)]
pub struct NegotiationRequest {
    pub current_soc_percent: f64,
    pub target_soc_percent: f64,
    pub battery_capacity_kwh: f64,
    pub deadline: DateTime<Utc>,
    pub strategy: Strategy,
    pub location: GeoPoint,
}

impl NegotiationRequest {
    /// Energy to deliver, from the SoC gap over the usable capacity.
    pub fn energy_needed_kwh(&self) -> f64 {
        ((self.target_soc_percent - self.current_soc_percent) / 100.0 * self.battery_capacity_kwh)
            .max(0.0)
    }
}

/// Connector availability snapshot of the chosen station.
#[derive(Debug, Clone)]
pub struct StationSnapshot {
    pub station_id: String,
    pub station_name: String,
    pub distance_km: f64,
    pub max_power_kw: f64,
    pub available_connectors: usize,
    pub total_connectors: usize,
}

/// Original-vs-negotiated pricing of the winning plan.
#[derive(Debug, Clone)]
pub struct PricingSummary {
    /// Whole energy priced at the day's peak rate plus the session fee,
    /// i.e. what an unscheduled session would cost.
    pub original_price_eur: f64,
    pub negotiated_price_eur: f64,
    pub savings_eur: f64,
    pub estimated_duration_min: u32,
}

/// The negotiator's single best recommendation.
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub plan: ChargingPlan,
    pub station: StationSnapshot,
    pub pricing: PricingSummary,
    pub current_soc_percent: f64,
    pub target_soc_percent: f64,
    pub energy_needed_kwh: f64,
    pub ready_by: DateTime<Utc>,
    pub recommended_start: DateTime<Utc>,
    /// 0–100 confidence that this station matches the strategy.
    pub match_score: u8,
    pub reason: String,
}

/// A candidate that survived plan construction.
struct Candidate {
    station: Station,
    distance_km: f64,
    plan: ChargingPlan,
    match_score: u8,
}

/// Orchestrates candidate selection, plan construction and pricing.
pub struct Negotiator {
    catalog: SharedStationCatalog,
    tariffs: SharedTariffBook,
    ledger: SharedCapacityLedger,
    builder: PlanBuilder,
    cfg: NegotiatorConfig,
}

impl Negotiator {
    pub fn new(
        catalog: SharedStationCatalog,
        tariffs: SharedTariffBook,
        ledger: SharedCapacityLedger,
        builder: PlanBuilder,
        cfg: NegotiatorConfig,
    ) -> Self {
        Self {
            catalog,
            tariffs,
            ledger,
            builder,
            cfg,
        }
    }

    pub fn shared(
        catalog: SharedStationCatalog,
        tariffs: SharedTariffBook,
        ledger: SharedCapacityLedger,
        builder: PlanBuilder,
        cfg: NegotiatorConfig,
    ) -> Arc<Self> {
        Arc::new(Self::new(catalog, tariffs, ledger, builder, cfg))
    }

    pub fn config(&self) -> &NegotiatorConfig {
        &self.cfg
    }

    /// Produce the best single recommendation for a request.
    pub fn negotiate(&self, request: &NegotiationRequest) -> Result<Recommendation, NegotiationError> {
        let now = Utc::now();
        self.negotiate_at(request, now)
    }

    /// Deterministic entry point: negotiation relative to an explicit
    /// "now". Everything downstream of the clock is pure.
    pub fn negotiate_at(
        &self,
        request: &NegotiationRequest,
        now: DateTime<Utc>,
    ) -> Result<Recommendation, NegotiationError> {
        let nearby = self
            .catalog
            .candidates(request.location, self.cfg.search_radius_km);
        if nearby.is_empty() {
            metrics::counter!("negotiations_total", "outcome" => "no_stations").increment(1);
            return Err(NegotiationError::NoStationsInRange {
                radius_km: self.cfg.search_radius_km,
            });
        }

        let shortlist = self.shortlist(nearby, now);
        let energy_needed_kwh = request.energy_needed_kwh();

        let mut candidates = Vec::new();
        let mut infeasible = Vec::new();
        let mut evaluated = 0usize;

        for (station, distance_km) in shortlist {
            evaluated += 1;
            match self.evaluate(&station, distance_km, request, energy_needed_kwh, now) {
                Ok(candidate) => candidates.push(candidate),
                Err(PlanError::InvalidDeadline(msg)) => {
                    metrics::counter!("negotiations_total", "outcome" => "invalid_deadline")
                        .increment(1);
                    return Err(NegotiationError::InvalidDeadline(msg));
                }
                Err(PlanError::InfeasibleDeadline {
                    deliverable_kwh, ..
                }) => {
                    debug!(
                        station_id = %station.id,
                        deliverable_kwh,
                        "Candidate cannot meet deadline"
                    );
                    infeasible.push((station, deliverable_kwh));
                }
            }
        }

        let Some(winner) = self.pick_winner(candidates, request.strategy) else {
            metrics::counter!("negotiations_total", "outcome" => "no_feasible_plan").increment(1);
            return Err(NegotiationError::NoFeasiblePlan {
                candidates_evaluated: evaluated,
                suggested_deadline: self.suggest_deadline(&infeasible, energy_needed_kwh, now),
            });
        };

        metrics::counter!(
            "negotiations_total",
            "outcome" => "ok",
            "strategy" => request.strategy.as_str()
        )
        .increment(1);
        info!(
            station_id = %winner.station.id,
            strategy = %request.strategy,
            total_cost_eur = winner.plan.total_cost_eur,
            match_score = winner.match_score,
            "Negotiation produced a plan"
        );

        Ok(self.recommendation(winner, request, energy_needed_kwh))
    }

    /// Heuristic pre-filter bounding how many candidates get a full
    /// plan evaluation: lower is better.
    fn score(&self, station: &Station, distance_km: f64, now: DateTime<Utc>) -> f64 {
        let (price, _) = self.tariffs.price_at(&station.tariff_id, now);
        let availability = if station.total_connectors() > 0 {
            station.available_connectors() as f64 / station.total_connectors() as f64
        } else {
            0.0
        };
        distance_km * 3.0 + price * 2.0 + 150.0 / station.max_power_kw.max(1.0)
            - availability * 5.0
    }

    fn shortlist(
        &self,
        mut nearby: Vec<(Station, f64)>,
        now: DateTime<Utc>,
    ) -> Vec<(Station, f64)> {
        nearby.sort_by(|(a, da), (b, db)| {
            self.score(a, *da, now)
                .total_cmp(&self.score(b, *db, now))
                .then_with(|| a.id.cmp(&b.id))
        });
        nearby.truncate(self.cfg.top_k);
        nearby
    }

    fn evaluate(
        &self,
        station: &Station,
        distance_km: f64,
        request: &NegotiationRequest,
        energy_needed_kwh: f64,
        now: DateTime<Utc>,
    ) -> Result<Candidate, PlanError> {
        let (first_slot, count) = self.builder.slot_span(now, request.deadline);
        let free = self
            .ledger
            .free_capacity(&station.site_id, first_slot, count);
        let tariff = self.tariffs.resolve(&station.tariff_id);

        let plan = self.builder.build(
            station,
            &tariff,
            &free,
            now,
            request.deadline,
            energy_needed_kwh,
            request.strategy,
        )?;

        let match_score = self.match_score(&plan, distance_km, request.strategy);
        Ok(Candidate {
            station: station.clone(),
            distance_km,
            plan,
            match_score,
        })
    }

    /// 0–100 strategy-weighted confidence from normalized cost, speed
    /// and distance.
    fn match_score(&self, plan: &ChargingPlan, distance_km: f64, strategy: Strategy) -> u8 {
        let cost_norm = (1.0 - plan.total_cost_eur / 10.0).max(0.0);
        let speed_norm = (1.0 - plan.duration_minutes() / 120.0).max(0.0);
        let distance_norm = (1.0 - distance_km / 10.0).max(0.0);

        let score = match strategy {
            Strategy::Cost => 0.7 * cost_norm + 0.2 * speed_norm + 0.1 * distance_norm,
            Strategy::Speed => 0.6 * speed_norm + 0.3 * cost_norm + 0.1 * distance_norm,
            Strategy::Balanced => 0.4 * speed_norm + 0.4 * cost_norm + 0.2 * distance_norm,
        };
        (score * 100.0).round().clamp(0.0, 100.0) as u8
    }

    /// Final choice among fully-evaluated candidates: lowest cost for
    /// `cost`, shortest duration for `speed`, lowest cost×duration for
    /// `balanced`; ties broken by match score, then station id.
    fn pick_winner(&self, candidates: Vec<Candidate>, strategy: Strategy) -> Option<Candidate> {
        candidates.into_iter().min_by(|a, b| {
            let key = |c: &Candidate| match strategy {
                Strategy::Cost => c.plan.total_cost_eur,
                Strategy::Speed => c.plan.duration_minutes(),
                Strategy::Balanced => c.plan.total_cost_eur * c.plan.duration_minutes(),
            };
            key(a)
                .total_cmp(&key(b))
                .then_with(|| b.match_score.cmp(&a.match_score))
                .then_with(|| a.station.id.cmp(&b.station.id))
        })
    }

    /// When every candidate was deadline-infeasible, estimate the
    /// earliest deadline the best of them could satisfy, one slot of
    /// margin included.
    fn suggest_deadline(
        &self,
        infeasible: &[(Station, f64)],
        energy_needed_kwh: f64,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let best_rate_kw = infeasible
            .iter()
            .map(|(station, _)| {
                station
                    .max_power_kw
                    .min(self.ledger.site_limit(&station.site_id))
            })
            .fold(0.0, f64::max);
        if best_rate_kw <= 0.0 {
            return None;
        }
        let hours = energy_needed_kwh / best_rate_kw;
        let margin = Duration::minutes(self.builder.clock().slot_minutes() as i64);
        Some(now + Duration::seconds((hours * 3600.0).ceil() as i64) + margin)
    }

    fn recommendation(
        &self,
        winner: Candidate,
        request: &NegotiationRequest,
        energy_needed_kwh: f64,
    ) -> Recommendation {
        let tariff = self.tariffs.resolve(&winner.station.tariff_id);
        let original_price_eur = if winner.plan.is_empty() {
            0.0
        } else {
            energy_needed_kwh * tariff.peak_price() + tariff.session_fee_eur
        };
        let negotiated_price_eur = winner.plan.total_cost_eur;
        let savings_eur = (original_price_eur - negotiated_price_eur).max(0.0);

        let reason = if winner.plan.is_empty() {
            "battery already at or above the target level".to_string()
        } else {
            match request.strategy {
                Strategy::Cost => format!(
                    "lowest total cost at {:.2} EUR, {:.0} min of charging",
                    negotiated_price_eur,
                    winner.plan.duration_minutes()
                ),
                Strategy::Speed => format!(
                    "fastest feasible plan, ready in {:.0} min",
                    winner.plan.duration_minutes()
                ),
                Strategy::Balanced => format!(
                    "best cost/time balance at {:.2} EUR in {:.0} min",
                    negotiated_price_eur,
                    winner.plan.duration_minutes()
                ),
            }
        };

        Recommendation {
            station: StationSnapshot {
                station_id: winner.station.id.clone(),
                station_name: winner.station.name.clone(),
                distance_km: winner.distance_km,
                max_power_kw: winner.station.max_power_kw,
                available_connectors: winner.station.available_connectors(),
                total_connectors: winner.station.total_connectors(),
            },
            pricing: PricingSummary {
                original_price_eur,
                negotiated_price_eur,
                savings_eur,
                estimated_duration_min: winner.plan.duration_minutes().round() as u32,
            },
            current_soc_percent: request.current_soc_percent,
            target_soc_percent: request.target_soc_percent,
            energy_needed_kwh,
            ready_by: request.deadline,
            recommended_start: winner.plan.start_time,
            match_score: winner.match_score,
            reason,
            plan: winner.plan,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::capacity::CapacityLedger;
    use crate::application::catalog::StationCatalog;
    use crate::application::planner::PlannerConfig;
    use crate::application::tariffs::TariffBook;
    use crate::domain::{Connector, DemandTier, PlugType, SlotClock, TariffSchedule};
    use chrono::TimeZone;

    fn station(id: &str, site: &str, lat: f64, lng: f64, power: f64, tariff: &str) -> Station {
        Station {
            id: id.into(),
            name: format!("Station {id}"),
            operator: "Test Ops".into(),
            site_id: site.into(),
            location: GeoPoint::new(lat, lng),
            address: None,
            city: None,
            max_power_kw: power,
            tariff_id: tariff.into(),
            connectors: vec![
                Connector::new("c-1", PlugType::Ccs2, power),
                Connector::new("c-2", PlugType::Type2, 22.0),
            ],
        }
    }

    fn setup() -> (Negotiator, DateTime<Utc>) {
        let catalog = StationCatalog::shared();
        let tariffs = TariffBook::shared();
        let ledger = Arc::new(CapacityLedger::new(SlotClock::new(15), 500.0));

        tariffs.insert(TariffSchedule::flat("t-cheap", "Cheap", 0.75, 0.20, DemandTier::Low));
        tariffs.insert(TariffSchedule::flat("t-dear", "Dear", 0.75, 0.45, DemandTier::High));

        // Two stations close to the driver, one far away.
        catalog.insert(station("st-cheap", "site-a", 60.17, 24.94, 50.0, "t-cheap"));
        catalog.insert(station("st-fast", "site-b", 60.17, 24.95, 150.0, "t-dear"));
        catalog.insert(station("st-far", "site-c", 59.44, 24.75, 300.0, "t-cheap"));

        let negotiator = Negotiator::new(
            catalog,
            tariffs,
            ledger,
            PlanBuilder::new(PlannerConfig::default()),
            NegotiatorConfig::default(),
        );
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        (negotiator, now)
    }

    fn request(strategy: Strategy, now: DateTime<Utc>, hours: i64) -> NegotiationRequest {
        NegotiationRequest {
            current_soc_percent: 40.0,
            target_soc_percent: 80.0,
            battery_capacity_kwh: 60.0,
            deadline: now + Duration::hours(hours),
            strategy,
            location: GeoPoint::new(60.17, 24.94),
        }
    }

    #[test]
    fn energy_needed_from_soc_gap() {
        let (_, now) = setup();
        let req = request(Strategy::Cost, now, 4);
        assert!((req.energy_needed_kwh() - 24.0).abs() < 1e-9);
    }

    #[test]
    fn cost_strategy_picks_cheapest_station() {
        let (negotiator, now) = setup();
        let rec = negotiator
            .negotiate_at(&request(Strategy::Cost, now, 4), now)
            .unwrap();

        assert_eq!(rec.station.station_id, "st-cheap");
        assert!(rec.plan.delivers(24.0));
        assert!(rec.plan.end_time <= rec.ready_by);
        assert!(rec.pricing.negotiated_price_eur <= rec.pricing.original_price_eur);
    }

    #[test]
    fn speed_strategy_picks_highest_power_station() {
        let (negotiator, now) = setup();
        let rec = negotiator
            .negotiate_at(&request(Strategy::Speed, now, 4), now)
            .unwrap();

        // 150 kW finishes 24 kWh far sooner than 50 kW.
        assert_eq!(rec.station.station_id, "st-fast");
        assert!(rec.pricing.estimated_duration_min < 60);
    }

    #[test]
    fn far_station_is_outside_search_radius() {
        let (negotiator, now) = setup();
        let rec = negotiator
            .negotiate_at(&request(Strategy::Cost, now, 4), now)
            .unwrap();
        assert_ne!(rec.station.station_id, "st-far");
        assert!(rec.station.distance_km < 50.0);
    }

    #[test]
    fn no_stations_in_range() {
        let (negotiator, now) = setup();
        let mut req = request(Strategy::Cost, now, 4);
        req.location = GeoPoint::new(0.0, 0.0);

        let err = negotiator.negotiate_at(&req, now).unwrap_err();
        assert!(matches!(err, NegotiationError::NoStationsInRange { .. }));
    }

    #[test]
    fn invalid_deadline_is_reported_before_planning() {
        let (negotiator, now) = setup();
        let mut req = request(Strategy::Cost, now, 4);
        req.deadline = now + Duration::minutes(2);

        let err = negotiator.negotiate_at(&req, now).unwrap_err();
        assert!(matches!(err, NegotiationError::InvalidDeadline(_)));
    }

    #[test]
    fn infeasible_deadline_suggests_extension() {
        let (negotiator, now) = setup();
        let mut req = request(Strategy::Speed, now, 4);
        // Six minutes is infeasible even at the 150 kW station (15 kWh max).
        req.deadline = now + Duration::minutes(6);

        match negotiator.negotiate_at(&req, now).unwrap_err() {
            NegotiationError::NoFeasiblePlan {
                candidates_evaluated,
                suggested_deadline,
            } => {
                assert!(candidates_evaluated > 0);
                let suggested = suggested_deadline.expect("suggestion");
                assert!(suggested > req.deadline);
                // 150 kW best rate → well under an hour including margin.
                assert!(suggested <= now + Duration::minutes(30));
            }
            other => panic!("expected NoFeasiblePlan, got {other:?}"),
        }
    }

    #[test]
    fn already_charged_returns_trivial_recommendation() {
        let (negotiator, now) = setup();
        let mut req = request(Strategy::Balanced, now, 4);
        req.current_soc_percent = 85.0;
        req.target_soc_percent = 80.0;

        let rec = negotiator.negotiate_at(&req, now).unwrap();
        assert!(rec.plan.is_empty());
        assert_eq!(rec.pricing.negotiated_price_eur, 0.0);
        assert_eq!(rec.energy_needed_kwh, 0.0);
        assert!(rec.reason.contains("already"));
    }

    #[test]
    fn committed_capacity_shapes_the_plan() {
        let catalog = StationCatalog::shared();
        let tariffs = TariffBook::shared();
        let ledger = Arc::new(CapacityLedger::new(SlotClock::new(15), 50.0));
        tariffs.insert(TariffSchedule::flat("t-1", "Flat", 0.75, 0.30, DemandTier::Medium));
        catalog.insert(station("st-1", "site-1", 60.17, 24.94, 50.0, "t-1"));
        ledger.register_site("site-1", 50.0);

        let negotiator = Negotiator::new(
            catalog,
            tariffs,
            ledger.clone(),
            PlanBuilder::new(PlannerConfig::default()),
            NegotiatorConfig::default(),
        );
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();

        // Another vehicle already draws 40 kW for the first hour.
        let first_slot = ledger.clock().index_of(now);
        let draws: Vec<_> = (0..4).map(|i| (first_slot + i, 40.0)).collect();
        ledger.try_commit("site-1", &draws).unwrap();

        let rec = negotiator
            .negotiate_at(&request(Strategy::Speed, now, 4), now)
            .unwrap();

        // First-hour phases are limited to the 10 kW left at the site.
        for phase in rec.plan.phases.iter().take(4) {
            assert!(phase.power_kw <= 10.0 + 1e-9);
        }
        assert!(rec.plan.delivers(24.0));
    }

    #[test]
    fn deterministic_tie_break_on_station_id() {
        let catalog = StationCatalog::shared();
        let tariffs = TariffBook::shared();
        let ledger = Arc::new(CapacityLedger::new(SlotClock::new(15), 500.0));
        tariffs.insert(TariffSchedule::flat("t-1", "Flat", 0.75, 0.30, DemandTier::Medium));
        // Identical twins at the same location.
        catalog.insert(station("st-a", "site-1", 60.17, 24.94, 50.0, "t-1"));
        catalog.insert(station("st-b", "site-2", 60.17, 24.94, 50.0, "t-1"));

        let negotiator = Negotiator::new(
            catalog,
            tariffs,
            ledger,
            PlanBuilder::new(PlannerConfig::default()),
            NegotiatorConfig::default(),
        );
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();

        let rec = negotiator
            .negotiate_at(&request(Strategy::Cost, now, 4), now)
            .unwrap();
        assert_eq!(rec.station.station_id, "st-a");
    }
}
