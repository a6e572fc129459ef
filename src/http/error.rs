use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::engine::EngineError;
use crate::observability;

/// Error half of every JSON handler.
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    BadRequest(&'static str),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

fn status_of(e: &EngineError) -> StatusCode {
    use EngineError::*;
    match e {
        InvalidRange(_) | Invalid(_) | LimitExceeded(_) => StatusCode::BAD_REQUEST,
        Forbidden(_) => StatusCode::FORBIDDEN,
        RoomNotFound(_) | NotFound(_) => StatusCode::NOT_FOUND,
        RoomUnavailable(_)
        | NoRoomAvailable
        | Conflict(_)
        | ServiceUnavailable(_)
        | DuplicateReview(_)
        | InvalidTransition { .. }
        | AlreadyExists(_)
        | InUse(_)
        | ReferencedByReview(_) => StatusCode::CONFLICT,
        WalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, label, message) = match &self {
            ApiError::Engine(e) if e.is_internal() => {
                error!("store fault: {e}");
                (status_of(e), e.label(), "internal error".to_string())
            }
            ApiError::Engine(e) => (status_of(e), e.label(), e.to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.to_string()),
        };
        metrics::counter!(observability::HTTP_ERRORS_TOTAL, "error" => label).increment(1);
        (status, Json(json!({ "error": label, "message": message }))).into_response()
    }
}
