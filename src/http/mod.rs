//! JSON API and messaging webhook.

mod error;
mod reservations;
mod reviews;
mod rooms;
mod services;
mod webhook;

pub use error::ApiError;
pub use webhook::escape_xml;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::engine::Engine;
use crate::intake::IntakePipeline;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub intake: Arc<IntakePipeline>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/rooms", get(rooms::list).post(rooms::create))
        .route("/api/rooms/availability", get(rooms::availability))
        .route(
            "/api/rooms/:id",
            get(rooms::get_one).put(rooms::update).delete(rooms::remove),
        )
        .route("/api/rooms/:id/calendar", get(rooms::calendar))
        .route(
            "/api/reservations",
            get(reservations::list).post(reservations::create),
        )
        .route(
            "/api/reservations/:id",
            get(reservations::get_one)
                .put(reservations::update)
                .delete(reservations::remove),
        )
        .route("/api/reservations/:id/check-in", post(reservations::check_in))
        .route("/api/reservations/:id/check-out", post(reservations::check_out))
        .route("/api/reservations/:id/cancel", post(reservations::cancel))
        .route("/api/services", get(services::list).post(services::create))
        .route("/api/services/available", get(services::available))
        .route(
            "/api/services/:id",
            get(services::get_one)
                .put(services::update)
                .delete(services::remove),
        )
        .route(
            "/api/service-bookings",
            get(services::list_bookings).post(services::book),
        )
        .route("/api/service-bookings/:id", delete(services::cancel_booking))
        .route("/api/reviews", get(reviews::list).post(reviews::create))
        .route(
            "/api/reviews/:id",
            get(reviews::get_one).put(reviews::update).delete(reviews::remove),
        )
        .route("/api/webhook", get(webhook::health).post(webhook::inbound))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
