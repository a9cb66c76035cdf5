//! API Router with Swagger UI

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::application::booking::SharedReservationManager;
use crate::application::catalog::SharedStationCatalog;
use crate::application::negotiator::Negotiator;
use crate::interfaces::http::common::ApiResponse;
use crate::interfaces::http::dto;
use crate::interfaces::http::handlers::{bookings, health, negotiator, stations};
use crate::notifications::SharedEventBus;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health_check,
        // Negotiator
        negotiator::negotiate_plan,
        // Bookings
        bookings::create_booking,
        bookings::list_bookings,
        bookings::get_booking,
        bookings::start_booking,
        bookings::complete_booking,
        bookings::cancel_booking,
        // Stations
        stations::list_stations,
        stations::get_station,
    ),
    components(
        schemas(
            ApiResponse<String>,
            health::HealthResponse,
            dto::StrategyDto,
            dto::DemandTierDto,
            dto::LocationDto,
            dto::NegotiateRequestDto,
            dto::PlanPhaseDto,
            dto::PlanDto,
            dto::StationSnapshotDto,
            dto::ChargingDetailsDto,
            dto::PricingDto,
            dto::RecommendationDto,
            dto::BookingRequestDto,
            dto::ReservationDto,
            dto::ConnectorDto,
            dto::StationDto,
        )
    ),
    tags(
        (name = "Health", description = "Server health check endpoints"),
        (name = "Negotiator", description = "Smart charging plan negotiation"),
        (name = "Bookings", description = "Reservation lifecycle: book, start, complete, cancel"),
        (name = "Stations", description = "Charging station catalog and availability"),
    ),
    info(
        title = "GridPass Smart Charging API",
        version = "1.0.0",
        description = "REST API for the charging plan negotiator and site-capacity scheduler",
        license(name = "MIT"),
    )
)]
pub struct ApiDoc;

/// Shared state for the metrics endpoint
#[derive(Clone)]
struct MetricsState {
    handle: PrometheusHandle,
}

/// `GET /metrics` — Prometheus scrape endpoint (no auth)
async fn prometheus_metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    let body = state.handle.render();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the API router with all routes.
pub fn create_api_router(
    negotiator: Arc<Negotiator>,
    reservation_manager: SharedReservationManager,
    catalog: SharedStationCatalog,
    event_bus: SharedEventBus,
    prometheus_handle: PrometheusHandle,
) -> Router {
    health::mark_started();

    let negotiator_routes = Router::new()
        .route("/plan", post(negotiator::negotiate_plan))
        .with_state(negotiator::NegotiatorAppState {
            negotiator,
            event_bus,
        });

    let booking_routes = Router::new()
        .route(
            "/",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route("/{reservation_id}", get(bookings::get_booking))
        .route("/{reservation_id}/start", post(bookings::start_booking))
        .route(
            "/{reservation_id}/complete",
            post(bookings::complete_booking),
        )
        .route("/{reservation_id}/cancel", post(bookings::cancel_booking))
        .with_state(bookings::BookingAppState {
            manager: reservation_manager,
        });

    let station_routes = Router::new()
        .route("/", get(stations::list_stations))
        .route("/{station_id}", get(stations::get_station))
        .with_state(stations::StationAppState { catalog });

    let metrics_routes = Router::new()
        .route("/metrics", get(prometheus_metrics))
        .with_state(MetricsState {
            handle: prometheus_handle,
        });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let swagger_routes = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    Router::new()
        .merge(swagger_routes)
        .route("/health", get(health::health_check))
        .merge(metrics_routes)
        .nest("/api/v1/negotiator", negotiator_routes)
        .nest("/api/v1/bookings", booking_routes)
        .nest("/api/v1/stations", station_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
