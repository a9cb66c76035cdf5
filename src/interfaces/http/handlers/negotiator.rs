//! Negotiation HTTP handler

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::application::negotiator::{NegotiationRequest, Negotiator};
use crate::domain::{GeoPoint, NegotiationError};
use crate::interfaces::http::common::{ApiResponse, ValidatedJson};
use crate::interfaces::http::dto::{NegotiateRequestDto, RecommendationDto};
use crate::notifications::{Event, SharedEventBus};

/// Application state for the negotiation endpoint.
#[derive(Clone)]
pub struct NegotiatorAppState {
    pub negotiator: Arc<Negotiator>,
    pub event_bus: SharedEventBus,
}

/// Negotiate the best charging plan for a request.
///
/// Pure computation; nothing is reserved until the plan is booked.
#[utoipa::path(
    post,
    path = "/api/v1/negotiator/plan",
    tag = "Negotiator",
    request_body = NegotiateRequestDto,
    responses(
        (status = 200, description = "Best feasible recommendation", body = ApiResponse<RecommendationDto>),
        (status = 400, description = "Invalid deadline or request"),
        (status = 404, description = "No stations in range"),
        (status = 409, description = "No feasible plan before the deadline")
    )
)]
pub async fn negotiate_plan(
    State(state): State<NegotiatorAppState>,
    ValidatedJson(request): ValidatedJson<NegotiateRequestDto>,
) -> Result<Json<ApiResponse<RecommendationDto>>, (StatusCode, Json<ApiResponse<RecommendationDto>>)>
{
    let battery_capacity_kwh = request
        .battery_capacity_kwh
        .unwrap_or(state.negotiator.config().default_battery_capacity_kwh);

    let domain_request = NegotiationRequest {
        current_soc_percent: request.current_soc_percent,
        target_soc_percent: request.target_soc_percent,
        battery_capacity_kwh,
        deadline: request.deadline,
        strategy: request.strategy.into(),
        location: GeoPoint::new(request.location.lat, request.location.lng),
    };

    let recommendation = state
        .negotiator
        .negotiate(&domain_request)
        .map_err(|e| negotiation_error_response(&e))?;

    state.event_bus.publish(Event::PlanNegotiated {
        station_id: recommendation.station.station_id.clone(),
        strategy: recommendation.plan.strategy,
        match_score: recommendation.match_score,
        total_cost_eur: recommendation.plan.total_cost_eur,
    });

    Ok(Json(ApiResponse::success(RecommendationDto::from(
        &recommendation,
    ))))
}

/// Each negotiation failure maps to a distinct status and message, so
/// the UI can offer the right recovery (re-prompt, widen search,
/// extend deadline).
fn negotiation_error_response(
    error: &NegotiationError,
) -> (StatusCode, Json<ApiResponse<RecommendationDto>>) {
    match error {
        NegotiationError::InvalidDeadline(_) => {
            (StatusCode::BAD_REQUEST, Json(ApiResponse::error(error.to_string())))
        }
        NegotiationError::NoStationsInRange { .. } => {
            (StatusCode::NOT_FOUND, Json(ApiResponse::error(error.to_string())))
        }
        NegotiationError::NoFeasiblePlan {
            suggested_deadline, ..
        } => {
            let message = match suggested_deadline {
                Some(suggested) => format!(
                    "{error}; extending the deadline to {} would make a plan feasible",
                    suggested.to_rfc3339()
                ),
                None => error.to_string(),
            };
            (StatusCode::CONFLICT, Json(ApiResponse::error(message)))
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────
