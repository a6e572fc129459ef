use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use ulid::Ulid;

use crate::model::*;

use super::{ApiResult, AppState};

pub async fn list(State(state): State<AppState>, Query(filter): Query<RoomFilter>) -> Json<Vec<Room>> {
    Json(state.engine.list_rooms(&filter).await)
}

pub async fn create(State(state): State<AppState>, Json(new): Json<NewRoom>) -> ApiResult<(StatusCode, Json<Room>)> {
    let room = state.engine.create_room(new).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

pub async fn get_one(State(state): State<AppState>, Path(id): Path<Ulid>) -> ApiResult<Json<Room>> {
    Ok(Json(state.engine.get_room(&id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Json(patch): Json<RoomPatch>,
) -> ApiResult<Json<Room>> {
    Ok(Json(state.engine.update_room(id, patch).await?))
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<Ulid>) -> ApiResult<StatusCode> {
    state.engine.delete_room(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    check_in: NaiveDate,
    check_out: NaiveDate,
    #[serde(default)]
    guests: Option<u32>,
    #[serde(default, rename = "type")]
    room_type: Option<RoomType>,
}

pub async fn availability(
    State(state): State<AppState>,
    Query(q): Query<AvailabilityQuery>,
) -> ApiResult<Json<Vec<Room>>> {
    let rooms = state
        .engine
        .find_available_rooms(q.check_in, q.check_out, q.guests.unwrap_or(1), q.room_type)
        .await?;
    Ok(Json(rooms))
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    from: NaiveDate,
    to: NaiveDate,
}

pub async fn calendar(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Query(q): Query<CalendarQuery>,
) -> ApiResult<Json<Vec<FreeWindow>>> {
    Ok(Json(state.engine.room_calendar(&id, q.from, q.to).await?))
}
