use chrono::{NaiveDate, NaiveDateTime};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::peak_load;
use super::EngineError;

pub fn now_ms() -> Ms {
    chrono::Utc::now().timestamp_millis()
}

/// Today's date in UTC.
pub fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

fn validate_span(span: &Span) -> Result<(), EngineError> {
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("date out of range"));
    }
    Ok(())
}

/// Check a stay's dates and return its span.
///
/// `today` is `None` when the stay may lie in the past (administrative edits
/// of reservations already under way).
pub(crate) fn validate_stay(
    check_in: NaiveDate,
    check_out: NaiveDate,
    today: Option<NaiveDate>,
) -> Result<Span, EngineError> {
    if check_in >= check_out {
        return Err(EngineError::InvalidRange("check-out must be after check-in"));
    }
    if let Some(today) = today
        && check_in < today
    {
        return Err(EngineError::InvalidRange("check-in is in the past"));
    }
    let span = Span::of_stay(check_in, check_out);
    validate_span(&span)?;
    if span.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(span)
}

/// Check a date window used by read queries.
pub(crate) fn validate_window(from: NaiveDate, to: NaiveDate) -> Result<Span, EngineError> {
    if from >= to {
        return Err(EngineError::InvalidRange("end must be after start"));
    }
    let span = Span::of_stay(from, to);
    validate_span(&span)?;
    if span.nights() > MAX_QUERY_WINDOW_DAYS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(span)
}

pub(crate) fn validate_party(guests: u32) -> Result<(), EngineError> {
    if guests == 0 {
        return Err(EngineError::Invalid("number of guests must be at least 1"));
    }
    if guests > MAX_PARTY_SIZE {
        return Err(EngineError::LimitExceeded("party too large"));
    }
    Ok(())
}

pub(crate) fn validate_slot(start: NaiveDateTime, end: NaiveDateTime) -> Result<Span, EngineError> {
    if start >= end {
        return Err(EngineError::InvalidRange("slot end must be after start"));
    }
    let span = Span::of_slot(start, end);
    validate_span(&span)?;
    if span.duration_ms() > MAX_SERVICE_SLOT_MS {
        return Err(EngineError::LimitExceeded("slot too long"));
    }
    Ok(span)
}

/// Fail with the first active reservation overlapping `span`, ignoring
/// `exclude` (the reservation being edited).
pub(crate) fn check_no_conflict(
    rs: &RoomState,
    span: &Span,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    match rs
        .active_overlapping(span)
        .find(|r| Some(r.id) != exclude)
    {
        Some(r) => Err(EngineError::Conflict(r.id)),
        None => Ok(()),
    }
}

/// Can this room take a party of `guests` for `span` at all?
pub(crate) fn room_accepts(rs: &RoomState, span: &Span, guests: u32, exclude: Option<Ulid>) -> bool {
    rs.room.status != RoomStatus::Maintenance
        && rs.room.capacity >= guests
        && check_no_conflict(rs, span, exclude).is_ok()
}

/// Why a service cannot take a booking, if it cannot.
pub(crate) fn service_refusal(
    ss: &ServiceState,
    start: NaiveDateTime,
    end: NaiveDateTime,
    guests: u32,
    now: Ms,
) -> Option<&'static str> {
    let service = &ss.service;
    if !service.is_active {
        return Some("service is not active");
    }
    if !service.availability.admits(start, end) {
        return Some("service is closed at that time");
    }
    let req = &service.requirements;
    if guests < req.minimum_guests {
        return Some("too few guests for this service");
    }
    if req.maximum_guests.is_some_and(|max| guests > max) {
        return Some("too many guests for this service");
    }
    let notice = Ms::from(req.advance_booking) * 3_600_000;
    if datetime_ms(start) < now + notice {
        return Some("not enough advance notice");
    }
    if let Some(capacity) = service.availability.max_capacity {
        let slot = Span::of_slot(start, end);
        let booked = peak_load(&ss.overlapping_load(&slot), &slot);
        if booked + guests > capacity {
            return Some("service is fully booked for that slot");
        }
    }
    None
}
