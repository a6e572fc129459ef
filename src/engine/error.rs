use ulid::Ulid;

use crate::model::ReservationStatus;

#[derive(Debug)]
pub enum EngineError {
    /// Dates out of order, in the past, or otherwise unusable.
    InvalidRange(&'static str),
    RoomNotFound(Ulid),
    /// The specific room asked for cannot take this stay.
    RoomUnavailable(Ulid),
    /// No room of the requested type can take this stay.
    NoRoomAvailable,
    /// A change would overlap the given active reservation.
    Conflict(Ulid),
    ServiceUnavailable(&'static str),
    NotFound(Ulid),
    Forbidden(&'static str),
    DuplicateReview(Ulid),
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },
    AlreadyExists(String),
    /// Entity still has active reservations or bookings.
    InUse(Ulid),
    ReferencedByReview(Ulid),
    Invalid(&'static str),
    LimitExceeded(&'static str),
    WalError(String),
}

impl EngineError {
    /// Store faults, as opposed to problems with the request.
    pub fn is_internal(&self) -> bool {
        matches!(self, EngineError::WalError(_))
    }

    /// Short stable name, used as a metrics label.
    pub fn label(&self) -> &'static str {
        match self {
            EngineError::InvalidRange(_) => "invalid_range",
            EngineError::RoomNotFound(_) => "room_not_found",
            EngineError::RoomUnavailable(_) => "room_unavailable",
            EngineError::NoRoomAvailable => "no_room_available",
            EngineError::Conflict(_) => "conflict",
            EngineError::ServiceUnavailable(_) => "service_unavailable",
            EngineError::NotFound(_) => "not_found",
            EngineError::Forbidden(_) => "forbidden",
            EngineError::DuplicateReview(_) => "duplicate_review",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::AlreadyExists(_) => "already_exists",
            EngineError::InUse(_) => "in_use",
            EngineError::ReferencedByReview(_) => "referenced_by_review",
            EngineError::Invalid(_) => "invalid",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::WalError(_) => "wal_error",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidRange(msg) => write!(f, "invalid date range: {msg}"),
            EngineError::RoomNotFound(id) => write!(f, "room not found: {id}"),
            EngineError::RoomUnavailable(id) => {
                write!(f, "room {id} is not available for these dates")
            }
            EngineError::NoRoomAvailable => write!(f, "no room available for these dates"),
            EngineError::Conflict(id) => write!(f, "conflict with reservation: {id}"),
            EngineError::ServiceUnavailable(msg) => write!(f, "service unavailable: {msg}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            EngineError::DuplicateReview(id) => {
                write!(f, "review already exists for this reservation: {id}")
            }
            EngineError::InvalidTransition { from, to } => {
                write!(f, "cannot move reservation from {from} to {to}")
            }
            EngineError::AlreadyExists(key) => write!(f, "already exists: {key}"),
            EngineError::InUse(id) => write!(f, "{id} still has active reservations or bookings"),
            EngineError::ReferencedByReview(id) => {
                write!(f, "reservation {id} is referenced by a review")
            }
            EngineError::Invalid(msg) => write!(f, "invalid request: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
