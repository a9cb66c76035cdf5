//! Station HTTP handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::application::catalog::SharedStationCatalog;
use crate::domain::GeoPoint;
use crate::interfaces::http::common::ApiResponse;
use crate::interfaces::http::dto::StationDto;

/// Application state for station handlers.
#[derive(Clone)]
pub struct StationAppState {
    pub catalog: SharedStationCatalog,
}

/// Optional proximity filter for station listings.
#[derive(Debug, Deserialize, IntoParams)]
pub struct StationQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Search radius; only used when lat and lng are present.
    pub radius_km: Option<f64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/stations",
    tag = "Stations",
    params(StationQuery),
    responses(
        (status = 200, description = "Stations, nearest first when a location is given", body = ApiResponse<Vec<StationDto>>)
    )
)]
pub async fn list_stations(
    State(state): State<StationAppState>,
    Query(query): Query<StationQuery>,
) -> Json<ApiResponse<Vec<StationDto>>> {
    let dtos = match (query.lat, query.lng) {
        (Some(lat), Some(lng)) => {
            let origin = GeoPoint::new(lat, lng);
            let radius_km = query.radius_km.unwrap_or(50.0);
            let mut nearby = state.catalog.candidates(origin, radius_km);
            nearby.sort_by(|(_, a), (_, b)| a.total_cmp(b));
            nearby
                .iter()
                .map(|(station, distance)| StationDto::from_station(station, Some(*distance)))
                .collect()
        }
        _ => {
            let mut stations = state.catalog.list();
            stations.sort_by(|a, b| a.id.cmp(&b.id));
            stations
                .iter()
                .map(|station| StationDto::from_station(station, None))
                .collect()
        }
    };

    Json(ApiResponse::success(dtos))
}

#[utoipa::path(
    get,
    path = "/api/v1/stations/{station_id}",
    tag = "Stations",
    params(("station_id" = String, Path, description = "Station ID")),
    responses(
        (status = 200, description = "Station details", body = ApiResponse<StationDto>),
        (status = 404, description = "Station not found")
    )
)]
pub async fn get_station(
    State(state): State<StationAppState>,
    Path(station_id): Path<String>,
) -> Result<Json<ApiResponse<StationDto>>, (StatusCode, Json<ApiResponse<StationDto>>)> {
    match state.catalog.get(&station_id) {
        Some(station) => Ok(Json(ApiResponse::success(StationDto::from_station(
            &station, None,
        )))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!(
                "Station '{station_id}' not found"
            ))),
        )),
    }
}

// ── Tests ──────────────────────────────────────────────────────
