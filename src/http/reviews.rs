use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use ulid::Ulid;

use crate::model::*;

use super::{ApiResult, AppState};

pub async fn list(State(state): State<AppState>, Query(filter): Query<ReviewFilter>) -> Json<Vec<Review>> {
    Json(state.engine.list_reviews(&filter))
}

pub async fn create(
    State(state): State<AppState>,
    Json(new): Json<NewReview>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    let review = state.engine.create_review(new).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn get_one(State(state): State<AppState>, Path(id): Path<Ulid>) -> ApiResult<Json<Review>> {
    Ok(Json(state.engine.get_review(&id)?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Ulid>,
    Json(patch): Json<ReviewPatch>,
) -> ApiResult<Json<Review>> {
    Ok(Json(state.engine.update_review(id, patch).await?))
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<Ulid>) -> ApiResult<StatusCode> {
    state.engine.delete_review(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
