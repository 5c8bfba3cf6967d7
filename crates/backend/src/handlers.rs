use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Json, Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
};
use diesel_async::RunQueryDsl;
use shared_types::{
    AvailabilityQuery, AvailabilityResponse, CancelBookingRequest, CancelBookingResponse,
    CreateBookingRequest, CreateBookingResponse,
};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::repository::PgStore;
use crate::services::rate_limit::client_ip;
use crate::services::BookingService;

/// Shared state for the public routes
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BookingService>,
    pub store: PgStore,
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<StatusCode> {
    let mut conn = state.store.pool().get().await?;
    diesel::sql_query("SELECT 1").execute(&mut *conn).await?;
    Ok(StatusCode::OK)
}

// GET /api/public/event-types/:id/availability
pub async fn get_availability(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<AvailabilityQuery>, QueryRejection>,
) -> ApiResult<Json<AvailabilityResponse>> {
    let Path(event_type_id) =
        path.map_err(|_| ApiError::invalid_field("eventTypeId", "IDの形式が正しくありません"))?;
    let Query(query) = query.map_err(|e| ApiError::JsonParse(e.body_text()))?;

    let response = state
        .service
        .availability(event_type_id, query.days_ahead)
        .await?;

    Ok(Json(response))
}

// POST /api/public/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateBookingResponse>)> {
    let Json(request) = payload.map_err(|e| ApiError::JsonParse(e.body_text()))?;

    let response = state
        .service
        .create_booking(&client_ip(&headers), request)
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

// POST /api/public/bookings/cancel
pub async fn cancel_booking(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CancelBookingRequest>, JsonRejection>,
) -> ApiResult<Json<CancelBookingResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::JsonParse(e.body_text()))?;

    let response = state
        .service
        .cancel_booking(&client_ip(&headers), request)
        .await?;

    Ok(Json(response))
}
