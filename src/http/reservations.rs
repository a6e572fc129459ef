use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use ulid::Ulid;

use crate::model::*;

use super::{ApiError, ApiResult, AppState};

pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ReservationFilter>,
) -> Json<Vec<Reservation>> {
    Json(state.engine.list_reservations(&filter).await)
}

/// Booking request body. Exactly one of `room` and `roomType` is given.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReservation {
    guest: Guest,
    #[serde(default, alias = "roomId")]
    room: Option<Ulid>,
    #[serde(default)]
    room_type: Option<RoomType>,
    check_in: NaiveDate,
    check_out: NaiveDate,
    number_of_guests: u32,
    #[serde(default)]
    add_ons: Vec<AddOnRequest>,
    #[serde(default)]
    idempotency_key: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewReservation>,
) -> ApiResult<(StatusCode, Json<Reservation>)> {
    let target = match (body.room, body.room_type) {
        (Some(id), None) => RoomTarget::Room(id),
        (None, Some(t)) => RoomTarget::Type(t),
        _ => return Err(ApiError::BadRequest("give exactly one of room and roomType")),
    };
    let idempotency_key = body.idempotency_key.or_else(|| {
        headers
            .get("idempotency-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });
    let reservation = state
        .engine
        .book(BookingRequest {
            guest: body.guest,
            target,
            check_in: body.check_in,
            check_out: body.check_out,
            number_of_guests: body.number_of_guests,
            add_ons: body.add_ons,
            idempotency_key,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

pub async fn get_one(State(state): State<AppState>, Path(id): Path<Ulid>) -> ApiResult<Json<Reservation>> {
    Ok(Json(state.engine.get_reservation(&id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Json(patch): Json<ReservationPatch>,
) -> ApiResult<Json<Reservation>> {
    Ok(Json(state.engine.update_reservation(id, patch).await?))
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<Ulid>) -> ApiResult<StatusCode> {
    state.engine.delete_reservation(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn check_in(State(state): State<AppState>, Path(id): Path<Ulid>) -> ApiResult<Json<Reservation>> {
    Ok(Json(state.engine.check_in(id).await?))
}

pub async fn check_out(State(state): State<AppState>, Path(id): Path<Ulid>) -> ApiResult<Json<Reservation>> {
    Ok(Json(state.engine.check_out(id).await?))
}

pub async fn cancel(State(state): State<AppState>, Path(id): Path<Ulid>) -> ApiResult<Json<Reservation>> {
    Ok(Json(state.engine.cancel(id).await?))
}
