use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDateTime;
use serde::Deserialize;
use ulid::Ulid;

use crate::model::*;

use super::{ApiError, ApiResult, AppState};

pub async fn list(State(state): State<AppState>, Query(filter): Query<ServiceFilter>) -> Json<Vec<Service>> {
    Json(state.engine.list_services(&filter).await)
}

pub async fn create(
    State(state): State<AppState>,
    Json(new): Json<NewService>,
) -> ApiResult<(StatusCode, Json<Service>)> {
    let service = state.engine.create_service(new).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

pub async fn get_one(State(state): State<AppState>, Path(id): Path<Ulid>) -> ApiResult<Json<Service>> {
    Ok(Json(state.engine.get_service(&id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Json(patch): Json<ServicePatch>,
) -> ApiResult<Json<Service>> {
    Ok(Json(state.engine.update_service(id, patch).await?))
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<Ulid>) -> ApiResult<StatusCode> {
    state.engine.delete_service(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    #[serde(rename = "type")]
    service_type: ServiceType,
    start: NaiveDateTime,
    end: NaiveDateTime,
    #[serde(default)]
    guests: Option<u32>,
}

pub async fn available(State(state): State<AppState>, Query(q): Query<SlotQuery>) -> ApiResult<Json<Service>> {
    let service = state
        .engine
        .find_available_service(q.service_type, q.start, q.end, q.guests.unwrap_or(1))
        .await?;
    Ok(Json(service))
}

// ── Service bookings ─────────────────────────────────────

/// Exactly one of `service` and `serviceType` is given.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewServiceBooking {
    #[serde(default, alias = "serviceId")]
    service: Option<Ulid>,
    #[serde(default)]
    service_type: Option<ServiceType>,
    start: NaiveDateTime,
    end: NaiveDateTime,
    guests: u32,
    guest_name: String,
    guest_email: String,
    #[serde(default)]
    reservation_id: Option<Ulid>,
}

pub async fn book(
    State(state): State<AppState>,
    Json(body): Json<NewServiceBooking>,
) -> ApiResult<(StatusCode, Json<ServiceBooking>)> {
    let target = match (body.service, body.service_type) {
        (Some(id), None) => ServiceTarget::Service(id),
        (None, Some(t)) => ServiceTarget::Type(t),
        _ => return Err(ApiError::BadRequest("give exactly one of service and serviceType")),
    };
    let booking = state
        .engine
        .book_service(ServiceBookingRequest {
            target,
            start: body.start,
            end: body.end,
            guests: body.guests,
            guest_name: body.guest_name,
            guest_email: body.guest_email,
            reservation_id: body.reservation_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingsQuery {
    #[serde(default)]
    service_id: Option<Ulid>,
}

pub async fn list_bookings(
    State(state): State<AppState>,
    Query(q): Query<BookingsQuery>,
) -> ApiResult<Json<Vec<ServiceBooking>>> {
    Ok(Json(state.engine.list_service_bookings(q.service_id).await?))
}

pub async fn cancel_booking(State(state): State<AppState>, Path(id): Path<Ulid>) -> ApiResult<StatusCode> {
    state.engine.cancel_service_booking(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
