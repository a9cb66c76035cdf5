//! Data Transfer Objects for the REST API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::application::negotiator::Recommendation;
use crate::domain::{
    ChargingPlan, DemandTier, PlanPhase, Reservation, Station, Strategy,
};

use super::common::round2;

/// Optimization strategy over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StrategyDto {
    Cost,
    Speed,
    Balanced,
}

impl From<StrategyDto> for Strategy {
    fn from(dto: StrategyDto) -> Self {
        match dto {
            StrategyDto::Cost => Strategy::Cost,
            StrategyDto::Speed => Strategy::Speed,
            StrategyDto::Balanced => Strategy::Balanced,
        }
    }
}

impl From<Strategy> for StrategyDto {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Cost => StrategyDto::Cost,
            Strategy::Speed => StrategyDto::Speed,
            Strategy::Balanced => StrategyDto::Balanced,
        }
    }
}

/// Demand tier over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DemandTierDto {
    Low,
    Medium,
    High,
}

impl From<DemandTierDto> for DemandTier {
    fn from(dto: DemandTierDto) -> Self {
        match dto {
            DemandTierDto::Low => DemandTier::Low,
            DemandTierDto::Medium => DemandTier::Medium,
            DemandTierDto::High => DemandTier::High,
        }
    }
}

impl From<DemandTier> for DemandTierDto {
    fn from(tier: DemandTier) -> Self {
        match tier {
            DemandTier::Low => DemandTierDto::Low,
            DemandTier::Medium => DemandTierDto::Medium,
            DemandTier::High => DemandTierDto::High,
        }
    }
}

/// Driver location in decimal degrees.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Validate, ToSchema)]
pub struct LocationDto {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
}

fn default_target_soc() -> f64 {
    80.0
}

fn default_strategy() -> StrategyDto {
    StrategyDto::Balanced
}

/// Request body for `POST /api/v1/negotiator/plan`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NegotiateRequestDto {
    /// Current battery level in percent.
    #[validate(range(min = 0.0, max = 100.0))]
    pub current_soc_percent: f64,
    /// Desired battery level in percent.
    #[serde(default = "default_target_soc")]
    #[validate(range(min = 1.0, max = 100.0))]
    pub target_soc_percent: f64,
    /// Usable battery capacity; defaults from configuration when absent.
    #[validate(range(min = 5.0, max = 300.0))]
    pub battery_capacity_kwh: Option<f64>,
    /// When the vehicle must be ready (ISO 8601).
    pub deadline: DateTime<Utc>,
    #[serde(default = "default_strategy")]
    pub strategy: StrategyDto,
    #[validate(nested)]
    pub location: LocationDto,
}

/// One constant-power phase of a plan.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlanPhaseDto {
    pub start: DateTime<Utc>,
    pub duration_min: f64,
    pub power_kw: f64,
    pub energy_kwh: f64,
    pub price_eur_per_kwh: f64,
    pub tier: DemandTierDto,
}

impl From<&PlanPhase> for PlanPhaseDto {
    fn from(phase: &PlanPhase) -> Self {
        Self {
            start: phase.start,
            duration_min: phase.duration_min,
            power_kw: phase.power_kw,
            energy_kwh: phase.energy_kwh,
            price_eur_per_kwh: phase.price_eur_per_kwh,
            tier: phase.tier.into(),
        }
    }
}

impl From<PlanPhaseDto> for PlanPhase {
    fn from(dto: PlanPhaseDto) -> Self {
        Self {
            start: dto.start,
            duration_min: dto.duration_min,
            power_kw: dto.power_kw,
            energy_kwh: dto.energy_kwh,
            price_eur_per_kwh: dto.price_eur_per_kwh,
            tier: dto.tier.into(),
        }
    }
}

/// A negotiated charging plan. Returned by the negotiator and sent back
/// verbatim when booking.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlanDto {
    pub station_id: String,
    pub site_id: String,
    pub strategy: StrategyDto,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub energy_kwh: f64,
    pub energy_cost_eur: f64,
    pub session_fee_eur: f64,
    pub total_cost_eur: f64,
    pub phases: Vec<PlanPhaseDto>,
}

impl From<&ChargingPlan> for PlanDto {
    fn from(plan: &ChargingPlan) -> Self {
        Self {
            station_id: plan.station_id.clone(),
            site_id: plan.site_id.clone(),
            strategy: plan.strategy.into(),
            created_at: plan.created_at,
            deadline: plan.deadline,
            start_time: plan.start_time,
            end_time: plan.end_time,
            energy_kwh: plan.energy_kwh,
            energy_cost_eur: plan.energy_cost_eur,
            session_fee_eur: plan.session_fee_eur,
            total_cost_eur: plan.total_cost_eur,
            phases: plan.phases.iter().map(PlanPhaseDto::from).collect(),
        }
    }
}

impl From<PlanDto> for ChargingPlan {
    fn from(dto: PlanDto) -> Self {
        Self {
            station_id: dto.station_id,
            site_id: dto.site_id,
            strategy: dto.strategy.into(),
            created_at: dto.created_at,
            deadline: dto.deadline,
            start_time: dto.start_time,
            end_time: dto.end_time,
            energy_kwh: dto.energy_kwh,
            energy_cost_eur: dto.energy_cost_eur,
            session_fee_eur: dto.session_fee_eur,
            total_cost_eur: dto.total_cost_eur,
            phases: dto.phases.into_iter().map(PlanPhase::from).collect(),
        }
    }
}

/// Chosen station with a connector availability snapshot.
#[derive(Debug, Serialize, ToSchema)]
pub struct StationSnapshotDto {
    pub station_id: String,
    pub station_name: String,
    pub distance_km: f64,
    pub max_power_kw: f64,
    pub available_connectors: usize,
    pub total_connectors: usize,
}

/// SoC and timing details of the recommendation.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChargingDetailsDto {
    pub current_level_percent: f64,
    pub target_level_percent: f64,
    pub energy_needed_kwh: f64,
    pub ready_by: DateTime<Utc>,
    pub recommended_start: DateTime<Utc>,
    pub recommended_end: DateTime<Utc>,
}

/// Original vs negotiated price of the plan.
#[derive(Debug, Serialize, ToSchema)]
pub struct PricingDto {
    pub original_price_eur: f64,
    pub negotiated_price_eur: f64,
    pub savings_eur: f64,
    pub estimated_duration_min: u32,
}

/// Response body for `POST /api/v1/negotiator/plan`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecommendationDto {
    pub strategy_used: StrategyDto,
    pub match_score: u8,
    pub reason: String,
    pub station: StationSnapshotDto,
    pub charging: ChargingDetailsDto,
    pub pricing: PricingDto,
    pub plan: PlanDto,
}

impl From<&Recommendation> for RecommendationDto {
    fn from(rec: &Recommendation) -> Self {
        Self {
            strategy_used: rec.plan.strategy.into(),
            match_score: rec.match_score,
            reason: rec.reason.clone(),
            station: StationSnapshotDto {
                station_id: rec.station.station_id.clone(),
                station_name: rec.station.station_name.clone(),
                distance_km: round2(rec.station.distance_km),
                max_power_kw: rec.station.max_power_kw,
                available_connectors: rec.station.available_connectors,
                total_connectors: rec.station.total_connectors,
            },
            charging: ChargingDetailsDto {
                current_level_percent: rec.current_soc_percent,
                target_level_percent: rec.target_soc_percent,
                energy_needed_kwh: round2(rec.energy_needed_kwh),
                ready_by: rec.ready_by,
                recommended_start: rec.recommended_start,
                recommended_end: rec.plan.end_time,
            },
            pricing: PricingDto {
                original_price_eur: round2(rec.pricing.original_price_eur),
                negotiated_price_eur: round2(rec.pricing.negotiated_price_eur),
                savings_eur: round2(rec.pricing.savings_eur),
                estimated_duration_min: rec.pricing.estimated_duration_min,
            },
            plan: PlanDto::from(&rec.plan),
        }
    }
}

/// Request body for `POST /api/v1/bookings`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct BookingRequestDto {
    #[validate(length(min = 1, max = 128))]
    pub driver_id: String,
    #[validate(length(min = 1, max = 64))]
    pub vehicle_id: String,
    #[validate(range(min = 0.0, max = 100.0))]
    pub current_soc_percent: f64,
    #[validate(range(min = 1.0, max = 100.0))]
    pub target_soc_percent: f64,
    /// The accepted plan, exactly as returned by the negotiator.
    pub plan: PlanDto,
}

/// Reservation details in API responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReservationDto {
    pub id: String,
    pub station_id: String,
    pub connector_id: String,
    pub connector_type: String,
    pub status: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub current_soc_percent: f64,
    pub target_soc_percent: f64,
    pub energy_kwh: f64,
    pub total_cost_eur: f64,
    pub anchored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Reservation> for ReservationDto {
    fn from(r: &Reservation) -> Self {
        Self {
            id: r.id.clone(),
            station_id: r.station_id.clone(),
            connector_id: r.connector_id.clone(),
            connector_type: r.plug.to_string(),
            status: r.status.to_string(),
            start_time: r.plan.start_time,
            end_time: r.plan.end_time,
            current_soc_percent: r.current_soc_percent,
            target_soc_percent: r.target_soc_percent,
            energy_kwh: round2(r.plan.energy_kwh),
            total_cost_eur: round2(r.plan.total_cost_eur),
            anchored: r.is_anchored(),
            anchor_id: r.anchor_id.clone(),
            created_at: r.created_at,
        }
    }
}

/// Connector details in station listings.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectorDto {
    pub id: String,
    #[serde(rename = "type")]
    pub plug_type: String,
    pub power_kw: f64,
    pub status: String,
}

/// Station details in API responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct StationDto {
    pub id: String,
    pub name: String,
    pub operator: String,
    pub city: Option<String>,
    pub address: Option<String>,
    pub lat: f64,
    pub lng: f64,
    /// Distance from the query location, when one was given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    pub max_power_kw: f64,
    pub tariff_id: String,
    pub available_connectors: usize,
    pub total_connectors: usize,
    pub connectors: Vec<ConnectorDto>,
}

impl StationDto {
    pub fn from_station(station: &Station, distance_km: Option<f64>) -> Self {
        Self {
            id: station.id.clone(),
            name: station.name.clone(),
            operator: station.operator.clone(),
            city: station.city.clone(),
            address: station.address.clone(),
            lat: station.location.lat,
            lng: station.location.lng,
            distance_km: distance_km.map(round2),
            max_power_kw: station.max_power_kw,
            tariff_id: station.tariff_id.clone(),
            available_connectors: station.available_connectors(),
            total_connectors: station.total_connectors(),
            connectors: station
                .connectors
                .iter()
                .map(|c| ConnectorDto {
                    id: c.id.clone(),
                    plug_type: c.plug.to_string(),
                    power_kw: c.power_kw,
                    status: c.status.to_string(),
                })
                .collect(),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn plan_round_trips_through_dto() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let mut plan =
            ChargingPlan::empty("st-1", "site-1", Strategy::Cost, start, start + Duration::hours(2));
        plan.phases.push(PlanPhase {
            start,
            duration_min: 15.0,
            power_kw: 11.0,
            energy_kwh: 2.75,
            price_eur_per_kwh: 0.34,
            tier: DemandTier::High,
        });
        plan.energy_kwh = 2.75;

        let dto = PlanDto::from(&plan);
        let back = ChargingPlan::from(dto);
        assert_eq!(back, plan);
    }

    #[test]
    fn negotiate_request_parses_with_defaults() {
        let json = r#"{
            "current_soc_percent": 40,
            "deadline": "2025-06-01T14:00:00Z",
            "location": {"lat": 60.17, "lng": 24.94}
        }"#;
        let dto: NegotiateRequestDto = serde_json::from_str(json).unwrap();
        assert_eq!(dto.target_soc_percent, 80.0);
        assert_eq!(dto.strategy, StrategyDto::Balanced);
        assert!(dto.battery_capacity_kwh.is_none());
        dto.validate().unwrap();
    }

    #[test]
    fn out_of_range_location_fails_validation() {
        let json = r#"{
            "current_soc_percent": 40,
            "deadline": "2025-06-01T14:00:00Z",
            "location": {"lat": 95.0, "lng": 24.94}
        }"#;
        let dto: NegotiateRequestDto = serde_json::from_str(json).unwrap();
        assert!(dto.validate().is_err());
    }

    #[test]
    fn strategy_dto_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&StrategyDto::Speed).unwrap(), "\"speed\"");
        let parsed: StrategyDto = serde_json::from_str("\"cost\"").unwrap();
        assert_eq!(parsed, StrategyDto::Cost);
    }
}
