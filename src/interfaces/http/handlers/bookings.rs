//! Booking HTTP handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::application::booking::{BookingRequest, SharedReservationManager};
use crate::domain::BookingError;
use crate::interfaces::http::common::{ApiResponse, ValidatedJson};
use crate::interfaces::http::dto::{BookingRequestDto, ReservationDto};

/// Application state for booking handlers.
#[derive(Clone)]
pub struct BookingAppState {
    pub manager: SharedReservationManager,
}

type BookingResponse =
    Result<Json<ApiResponse<ReservationDto>>, (StatusCode, Json<ApiResponse<ReservationDto>>)>;

fn status_for(error: &BookingError) -> StatusCode {
    match error {
        BookingError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
        BookingError::NoAvailability(_) | BookingError::CapacityExceeded { .. } => {
            StatusCode::CONFLICT
        }
        BookingError::StationNotFound(_) | BookingError::ReservationNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        BookingError::InvalidState { .. } => StatusCode::BAD_REQUEST,
    }
}

fn error_response(error: BookingError) -> (StatusCode, Json<ApiResponse<ReservationDto>>) {
    (status_for(&error), Json(ApiResponse::error(error.to_string())))
}

/// Book an accepted plan: authenticate, reserve a connector, commit the
/// plan's capacity, persist the reservation.
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    tag = "Bookings",
    request_body = BookingRequestDto,
    responses(
        (status = 200, description = "Reservation booked", body = ApiResponse<ReservationDto>),
        (status = 401, description = "Authentication failed"),
        (status = 409, description = "Connector or capacity race lost; re-negotiate")
    )
)]
pub async fn create_booking(
    State(state): State<BookingAppState>,
    ValidatedJson(request): ValidatedJson<BookingRequestDto>,
) -> BookingResponse {
    let booking = BookingRequest {
        plan: request.plan.into(),
        driver_id: request.driver_id,
        vehicle_id: request.vehicle_id,
        current_soc_percent: request.current_soc_percent,
        target_soc_percent: request.target_soc_percent,
    };

    let reservation = state.manager.book(booking).await.map_err(error_response)?;
    Ok(Json(ApiResponse::success(ReservationDto::from(&reservation))))
}

#[utoipa::path(
    get,
    path = "/api/v1/bookings",
    tag = "Bookings",
    responses(
        (status = 200, description = "All reservations", body = ApiResponse<Vec<ReservationDto>>)
    )
)]
pub async fn list_bookings(
    State(state): State<BookingAppState>,
) -> Json<ApiResponse<Vec<ReservationDto>>> {
    let mut reservations = state.manager.list();
    reservations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let dtos = reservations.iter().map(ReservationDto::from).collect();
    Json(ApiResponse::success(dtos))
}

#[utoipa::path(
    get,
    path = "/api/v1/bookings/{reservation_id}",
    tag = "Bookings",
    params(("reservation_id" = String, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation details", body = ApiResponse<ReservationDto>),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_booking(
    State(state): State<BookingAppState>,
    Path(reservation_id): Path<String>,
) -> BookingResponse {
    match state.manager.get(&reservation_id) {
        Some(reservation) => Ok(Json(ApiResponse::success(ReservationDto::from(&reservation)))),
        None => Err(error_response(BookingError::ReservationNotFound(
            reservation_id,
        ))),
    }
}

/// Mark the charging session as started.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{reservation_id}/start",
    tag = "Bookings",
    params(("reservation_id" = String, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Session started", body = ApiResponse<ReservationDto>),
        (status = 400, description = "Not in a startable state"),
        (status = 404, description = "Not found")
    )
)]
pub async fn start_booking(
    State(state): State<BookingAppState>,
    Path(reservation_id): Path<String>,
) -> BookingResponse {
    let reservation = state.manager.start(&reservation_id).map_err(error_response)?;
    Ok(Json(ApiResponse::success(ReservationDto::from(&reservation))))
}

/// Complete the session and free the connector; elapsed capacity stays
/// recorded.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{reservation_id}/complete",
    tag = "Bookings",
    params(("reservation_id" = String, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Session completed", body = ApiResponse<ReservationDto>),
        (status = 400, description = "Not in a completable state"),
        (status = 404, description = "Not found")
    )
)]
pub async fn complete_booking(
    State(state): State<BookingAppState>,
    Path(reservation_id): Path<String>,
) -> BookingResponse {
    let reservation = state
        .manager
        .complete(&reservation_id)
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(ReservationDto::from(&reservation))))
}

/// Cancel a booking, releasing the connector and the not-yet-elapsed
/// capacity.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{reservation_id}/cancel",
    tag = "Bookings",
    params(("reservation_id" = String, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation cancelled", body = ApiResponse<ReservationDto>),
        (status = 400, description = "Already cancelled or completed"),
        (status = 404, description = "Not found")
    )
)]
pub async fn cancel_booking(
    State(state): State<BookingAppState>,
    Path(reservation_id): Path<String>,
) -> BookingResponse {
    let reservation = state
        .manager
        .cancel(&reservation_id)
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(ReservationDto::from(&reservation))))
}

// ── Tests ──────────────────────────────────────────────────────
