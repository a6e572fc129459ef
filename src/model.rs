use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::MAX_VALID_TIMESTAMP_MS;

/// Unix milliseconds, the engine's only time type.
pub type Ms = i64;

/// Money in minor currency units (cents).
pub type Amount = u64;

pub const DAY_MS: Ms = 86_400_000;

/// Half-open overlap test: `[a_start, a_end)` and `[b_start, b_end)` share an instant.
///
/// Every conflict decision in the crate goes through here, for stays and service
/// slots alike. Touching ranges (`a_end == b_start`) do not overlap.
pub fn overlaps(a_start: Ms, a_end: Ms, b_start: Ms, b_end: Ms) -> bool {
    a_start < b_end && b_start < a_end
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Span of a stay: midnight UTC of check-in to midnight UTC of check-out.
    pub fn of_stay(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        Self {
            start: date_ms(check_in),
            end: date_ms(check_out),
        }
    }

    pub fn of_slot(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start: datetime_ms(start),
            end: datetime_ms(end),
        }
    }

    /// Everything from `now` onward.
    pub fn from_now(now: Ms) -> Self {
        Self::new(now, MAX_VALID_TIMESTAMP_MS)
    }

    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        overlaps(self.start, self.end, other.start, other.end)
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }

    /// Nights covered by a stay span, rounding partial days up.
    pub fn nights(&self) -> i64 {
        (self.duration_ms() + DAY_MS - 1).div_euclid(DAY_MS)
    }
}

pub fn date_ms(date: NaiveDate) -> Ms {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

pub fn datetime_ms(dt: NaiveDateTime) -> Ms {
    dt.and_utc().timestamp_millis()
}

/// Convert a day-aligned millisecond timestamp back to its UTC date.
pub fn ms_date(ms: Ms) -> Option<NaiveDate> {
    chrono::DateTime::from_timestamp_millis(ms).map(|dt| dt.date_naive())
}

/// `nights × price_per_night`.
pub fn stay_amount(span: &Span, price_per_night: Amount) -> Amount {
    (span.nights().max(0) as Amount).saturating_mul(price_per_night)
}

// ── Rooms ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    Single,
    Double,
    Suite,
}

impl RoomType {
    pub const ALL: [RoomType; 3] = [RoomType::Single, RoomType::Double, RoomType::Suite];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Single => "single",
            RoomType::Double => "double",
            RoomType::Suite => "suite",
        }
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if lower.contains("suite") {
            Ok(RoomType::Suite)
        } else if lower.contains("double") {
            Ok(RoomType::Double)
        } else if lower.contains("single") {
            Ok(RoomType::Single)
        } else {
            Err(format!("unknown room type: {s}"))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Available,
    Occupied,
    Maintenance,
    Reserved,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Available => "available",
            RoomStatus::Occupied => "occupied",
            RoomStatus::Maintenance => "maintenance",
            RoomStatus::Reserved => "reserved",
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: Ulid,
    pub room_number: String,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    /// Maximum number of guests.
    pub capacity: u32,
    pub price_per_night: Amount,
    pub status: RoomStatus,
    pub floor: i32,
    pub description: String,
    pub amenities: Vec<String>,
}

// ── Reservations ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReservationStatus {
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl ReservationStatus {
    /// Active reservations hold their room for their date range.
    pub fn is_active(&self) -> bool {
        matches!(self, ReservationStatus::Confirmed | ReservationStatus::CheckedIn)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Confirmed, CheckedIn) | (CheckedIn, CheckedOut) | (Confirmed, Cancelled) | (CheckedIn, Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::CheckedIn => "checked-in",
            ReservationStatus::CheckedOut => "checked-out",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// Contact snapshot taken at booking time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guest {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub special_requests: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOn {
    pub service_id: Ulid,
    pub quantity: u32,
    pub price: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Ulid,
    pub guest: Guest,
    pub room_id: Ulid,
    pub check_in: NaiveDate,
    /// Exclusive: the guest leaves on this day.
    pub check_out: NaiveDate,
    pub number_of_guests: u32,
    pub total_amount: Amount,
    pub payment_status: PaymentStatus,
    pub status: ReservationStatus,
    pub add_ons: Vec<AddOn>,
    pub idempotency_key: Option<String>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl Reservation {
    pub fn span(&self) -> Span {
        Span::of_stay(self.check_in, self.check_out)
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn add_ons_amount(&self) -> Amount {
        self.add_ons.iter().map(|a| a.price).sum()
    }
}

/// Derive a room's cached status from the reservations that hold it.
///
/// `maintenance` is administrative and always wins. Otherwise a checked-in
/// guest makes the room `occupied`, any active reservation reaching into
/// `[now, ∞)` makes it `reserved`, and it is `available` when nothing does.
pub fn derive_room_status(
    current: RoomStatus,
    reservations: impl IntoIterator<Item = (ReservationStatus, Span)>,
    now: Ms,
) -> RoomStatus {
    if current == RoomStatus::Maintenance {
        return RoomStatus::Maintenance;
    }
    let horizon = Span::from_now(now);
    let mut reserved = false;
    for (status, span) in reservations {
        match status {
            ReservationStatus::CheckedIn => return RoomStatus::Occupied,
            ReservationStatus::Confirmed if span.overlaps(&horizon) => reserved = true,
            _ => {}
        }
    }
    if reserved {
        RoomStatus::Reserved
    } else {
        RoomStatus::Available
    }
}

/// A room plus every reservation ever made for it, sorted by check-in.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    pub reservations: Vec<Reservation>,
}

impl RoomState {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            reservations: Vec::new(),
        }
    }

    pub fn id(&self) -> Ulid {
        self.room.id
    }

    /// Insert (or replace) a reservation keeping check-in order.
    pub fn upsert_reservation(&mut self, reservation: Reservation) {
        self.remove_reservation(reservation.id);
        let start = reservation.check_in;
        let pos = self.reservations.partition_point(|r| r.check_in <= start);
        self.reservations.insert(pos, reservation);
    }

    pub fn remove_reservation(&mut self, id: Ulid) -> Option<Reservation> {
        let pos = self.reservations.iter().position(|r| r.id == id)?;
        Some(self.reservations.remove(pos))
    }

    pub fn reservation(&self, id: &Ulid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| &r.id == id)
    }

    pub fn reservation_mut(&mut self, id: &Ulid) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| &r.id == id)
    }

    /// Active reservations whose stay overlaps the query window.
    /// Uses binary search to skip reservations starting at or after `query.end`.
    pub fn active_overlapping(&self, query: &Span) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| date_ms(r.check_in) < query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.is_active() && r.span().overlaps(query))
    }

    pub fn has_active_reservations(&self) -> bool {
        self.reservations.iter().any(Reservation::is_active)
    }

    /// The status the room should show right now.
    pub fn derived_status(&self, now: Ms) -> RoomStatus {
        derive_room_status(
            self.room.status,
            self.reservations.iter().map(|r| (r.status, r.span())),
            now,
        )
    }
}

// ── Services ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceType {
    Restaurant,
    Spa,
    Gym,
    Laundry,
    #[serde(alias = "room-service")]
    RoomService,
    Transport,
    Tour,
    Childcare,
    Business,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Restaurant => "restaurant",
            ServiceType::Spa => "spa",
            ServiceType::Gym => "gym",
            ServiceType::Laundry => "laundry",
            ServiceType::RoomService => "roomService",
            ServiceType::Transport => "transport",
            ServiceType::Tour => "tour",
            ServiceType::Childcare => "childcare",
            ServiceType::Business => "business",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<Weekday> for DayOfWeek {
    fn from(w: Weekday) -> Self {
        match w {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

/// Weekly opening pattern of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyAvailability {
    #[serde(default)]
    pub days: Vec<DayOfWeek>,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    /// Maximum guests served at any one instant. `None` = unlimited.
    #[serde(default)]
    pub max_capacity: Option<u32>,
}

impl WeeklyAvailability {
    /// True if the slot falls on an open day and inside opening hours.
    pub fn admits(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        if !self.days.contains(&DayOfWeek::from(start.weekday())) {
            return false;
        }
        match (self.start_time, self.end_time) {
            (Some(open), Some(close)) => {
                start.date() == end.date() && start.time() >= open && end.time() <= close
            }
            (Some(open), None) => start.time() >= open,
            (None, Some(close)) => start.date() == end.date() && end.time() <= close,
            (None, None) => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialOffer {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Percentage off, 0–100.
    pub discount: u8,
    #[serde(default)]
    pub valid_from: Option<NaiveDate>,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl SpecialOffer {
    pub fn is_current(&self, today: NaiveDate) -> bool {
        self.is_active
            && self.valid_from.is_none_or(|from| from <= today)
            && self.valid_until.is_none_or(|until| today <= until)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequirements {
    /// Hours of notice required before a slot starts.
    #[serde(default)]
    pub advance_booking: u32,
    #[serde(default = "default_one")]
    pub minimum_guests: u32,
    #[serde(default)]
    pub maximum_guests: Option<u32>,
}

impl Default for ServiceRequirements {
    fn default() -> Self {
        Self {
            advance_booking: 0,
            minimum_guests: 1,
            maximum_guests: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_one() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: Ulid,
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    pub description: String,
    /// Price per guest.
    pub price: Amount,
    pub availability: WeeklyAvailability,
    pub is_active: bool,
    pub special_offers: Vec<SpecialOffer>,
    pub requirements: ServiceRequirements,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBooking {
    pub id: Ulid,
    pub service_id: Ulid,
    pub reservation_id: Option<Ulid>,
    pub guest_name: String,
    pub guest_email: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub guests: u32,
    pub total_price: Amount,
    pub created_at: Ms,
}

impl ServiceBooking {
    pub fn span(&self) -> Span {
        Span::of_slot(self.start, self.end)
    }
}

/// A service plus its bookings, sorted by slot start.
#[derive(Debug, Clone)]
pub struct ServiceState {
    pub service: Service,
    pub bookings: Vec<ServiceBooking>,
}

impl ServiceState {
    pub fn new(service: Service) -> Self {
        Self {
            service,
            bookings: Vec::new(),
        }
    }

    pub fn insert_booking(&mut self, booking: ServiceBooking) {
        let pos = self.bookings.partition_point(|b| b.start <= booking.start);
        self.bookings.insert(pos, booking);
    }

    pub fn remove_booking(&mut self, id: Ulid) -> Option<ServiceBooking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    /// `(slot, guests)` of bookings overlapping the query window.
    pub fn overlapping_load(&self, query: &Span) -> Vec<(Span, u32)> {
        let right_bound = self
            .bookings
            .partition_point(|b| datetime_ms(b.start) < query.end);
        self.bookings[..right_bound]
            .iter()
            .map(|b| (b.span(), b.guests))
            .filter(|(span, _)| span.overlaps(query))
            .collect()
    }
}

// ── Reviews ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reviewer {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRatings {
    #[serde(default)]
    pub cleanliness: Option<u8>,
    #[serde(default)]
    pub service: Option<u8>,
    #[serde(default)]
    pub comfort: Option<u8>,
    #[serde(default)]
    pub location: Option<u8>,
    #[serde(default)]
    pub value: Option<u8>,
}

impl CategoryRatings {
    pub fn all(&self) -> [Option<u8>; 5] {
        [self.cleanliness, self.service, self.comfort, self.location, self.value]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelResponse {
    pub comment: String,
    pub responded_by: String,
    pub responded_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Ulid,
    pub reservation_id: Ulid,
    pub rating: u8,
    pub comment: String,
    pub guest: Reviewer,
    pub categories: Option<CategoryRatings>,
    pub response: Option<HotelResponse>,
    /// Set once the reviewed stay has been checked out.
    pub is_verified: bool,
    pub created_at: Ms,
    pub updated_at: Ms,
}

/// The event types, flat with no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        room: Room,
    },
    RoomUpdated {
        room: Room,
    },
    RoomDeleted {
        id: Ulid,
    },
    RoomStatusSet {
        id: Ulid,
        status: RoomStatus,
    },
    ReservationConfirmed {
        reservation: Reservation,
        room_status: RoomStatus,
    },
    /// Dates, party size or amount changed; the room stays the same.
    ReservationUpdated {
        reservation: Reservation,
        room_status: RoomStatus,
    },
    ReservationMoved {
        reservation: Reservation,
        from_room_id: Ulid,
        from_room_status: RoomStatus,
        room_status: RoomStatus,
    },
    ReservationStatusChanged {
        id: Ulid,
        room_id: Ulid,
        status: ReservationStatus,
        room_status: RoomStatus,
        at: Ms,
    },
    PaymentStatusChanged {
        id: Ulid,
        room_id: Ulid,
        payment_status: PaymentStatus,
        at: Ms,
    },
    ReservationDeleted {
        id: Ulid,
        room_id: Ulid,
        room_status: RoomStatus,
    },
    ServiceCreated {
        service: Service,
    },
    ServiceUpdated {
        service: Service,
    },
    ServiceDeleted {
        id: Ulid,
    },
    ServiceBooked {
        booking: ServiceBooking,
    },
    ServiceBookingCancelled {
        id: Ulid,
        service_id: Ulid,
    },
    ReviewCreated {
        review: Review,
    },
    ReviewUpdated {
        review: Review,
    },
    ReviewDeleted {
        id: Ulid,
        reservation_id: Ulid,
    },
}

// ── Commands ─────────────────────────────────────────────────────

/// Which room a booking is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomTarget {
    Room(Ulid),
    Type(RoomType),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOnRequest {
    pub service: Ulid,
    #[serde(default = "default_one")]
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub guest: Guest,
    pub target: RoomTarget,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub number_of_guests: u32,
    pub add_ons: Vec<AddOnRequest>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationPatch {
    #[serde(default)]
    pub check_in: Option<NaiveDate>,
    #[serde(default)]
    pub check_out: Option<NaiveDate>,
    #[serde(default, alias = "room")]
    pub room_id: Option<Ulid>,
    #[serde(default)]
    pub number_of_guests: Option<u32>,
    #[serde(default)]
    pub status: Option<ReservationStatus>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
}

impl ReservationPatch {
    pub fn touches_stay(&self) -> bool {
        self.check_in.is_some()
            || self.check_out.is_some()
            || self.room_id.is_some()
            || self.number_of_guests.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoom {
    pub room_number: String,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    #[serde(alias = "maxOccupancy")]
    pub capacity: u32,
    pub price_per_night: Amount,
    #[serde(default)]
    pub floor: i32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amenities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPatch {
    #[serde(default)]
    pub room_number: Option<String>,
    #[serde(default, rename = "type")]
    pub room_type: Option<RoomType>,
    #[serde(default, alias = "maxOccupancy")]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub price_per_night: Option<Amount>,
    #[serde(default)]
    pub floor: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amenities: Option<Vec<String>>,
    /// Only `maintenance` (take out of service) and `available` (return to
    /// service) are accepted; other statuses are derived.
    #[serde(default)]
    pub status: Option<RoomStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewService {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    #[serde(default)]
    pub description: String,
    pub price: Amount,
    #[serde(default)]
    pub availability: WeeklyAvailability,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub special_offers: Vec<SpecialOffer>,
    #[serde(default)]
    pub requirements: ServiceRequirements,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<Amount>,
    #[serde(default)]
    pub availability: Option<WeeklyAvailability>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub special_offers: Option<Vec<SpecialOffer>>,
    #[serde(default)]
    pub requirements: Option<ServiceRequirements>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceTarget {
    Service(Ulid),
    Type(ServiceType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceBookingRequest {
    pub target: ServiceTarget,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub guests: u32,
    pub guest_name: String,
    pub guest_email: String,
    pub reservation_id: Option<Ulid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    #[serde(alias = "reservationId")]
    pub reservation: Ulid,
    pub rating: u8,
    pub comment: String,
    pub guest: Reviewer,
    #[serde(default)]
    pub categories: Option<CategoryRatings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseInput {
    pub comment: String,
    pub responded_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPatch {
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub categories: Option<CategoryRatings>,
    #[serde(default)]
    pub response: Option<ResponseInput>,
}

// ── Query filters ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomFilter {
    #[serde(default, rename = "type")]
    pub room_type: Option<RoomType>,
    #[serde(default)]
    pub status: Option<RoomStatus>,
    #[serde(default)]
    pub min_price: Option<Amount>,
    #[serde(default)]
    pub max_price: Option<Amount>,
}

impl RoomFilter {
    pub fn matches(&self, room: &Room) -> bool {
        self.room_type.is_none_or(|t| t == room.room_type)
            && self.status.is_none_or(|s| s == room.status)
            && self.min_price.is_none_or(|p| room.price_per_night >= p)
            && self.max_price.is_none_or(|p| room.price_per_night <= p)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationFilter {
    #[serde(default)]
    pub status: Option<ReservationStatus>,
    #[serde(default)]
    pub email: Option<String>,
    /// Check-in on or after this date.
    #[serde(default)]
    pub from: Option<NaiveDate>,
    /// Check-in on or before this date.
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

impl ReservationFilter {
    pub fn matches(&self, r: &Reservation) -> bool {
        self.status.is_none_or(|s| s == r.status)
            && self
                .email
                .as_deref()
                .is_none_or(|e| r.guest.email.eq_ignore_ascii_case(e))
            && self.from.is_none_or(|d| r.check_in >= d)
            && self.to.is_none_or(|d| r.check_in <= d)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceFilter {
    #[serde(default, rename = "type")]
    pub service_type: Option<ServiceType>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub max_price: Option<Amount>,
}

impl ServiceFilter {
    pub fn matches(&self, s: &Service) -> bool {
        self.service_type.is_none_or(|t| t == s.service_type)
            && self.is_active.is_none_or(|a| a == s.is_active)
            && self.max_price.is_none_or(|p| s.price <= p)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewFilter {
    #[serde(default)]
    pub min_rating: Option<u8>,
    #[serde(default)]
    pub is_verified: Option<bool>,
    #[serde(default)]
    pub email: Option<String>,
}

impl ReviewFilter {
    pub fn matches(&self, r: &Review) -> bool {
        self.min_rating.is_none_or(|m| r.rating >= m)
            && self.is_verified.is_none_or(|v| v == r.is_verified)
            && self
                .email
                .as_deref()
                .is_none_or(|e| r.guest.email.eq_ignore_ascii_case(e))
    }
}

// ── Query result types ───────────────────────────────────────────

/// A free window in a room's calendar: `[from, to)` in days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomTypeSummary {
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub price_from: Amount,
    pub max_capacity: u32,
    pub available_tonight: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    pub price: Amount,
    pub days: Vec<DayOfWeek>,
    pub offers: Vec<SpecialOffer>,
}

/// What the hotel looks like right now, as fed to the conversational assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelSnapshot {
    pub today: NaiveDate,
    pub rooms: Vec<RoomTypeSummary>,
    pub services: Vec<ServiceSummary>,
}
