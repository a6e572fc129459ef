use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::model::*;

use super::{SharedRoomState, SharedServiceState};

/// Serializes requests carrying the same idempotency key; holds the
/// reservation the first request created.
pub type IdempotencySlot = Arc<Mutex<Option<Ulid>>>;

/// The hotel's collections and their secondary indexes.
///
/// Rooms and services live behind their own `RwLock`; everything else is an
/// index kept in step with the events applied to them.
pub struct InMemoryStore {
    rooms: DashMap<Ulid, SharedRoomState>,
    room_numbers: DashMap<String, Ulid>,
    reservation_to_room: DashMap<Ulid, Ulid>,
    idempotency: DashMap<String, IdempotencySlot>,
    services: DashMap<Ulid, SharedServiceState>,
    booking_to_service: DashMap<Ulid, Ulid>,
    reviews: DashMap<Ulid, Review>,
    review_by_reservation: DashMap<Ulid, Ulid>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            room_numbers: DashMap::new(),
            reservation_to_room: DashMap::new(),
            idempotency: DashMap::new(),
            services: DashMap::new(),
            booking_to_service: DashMap::new(),
            reviews: DashMap::new(),
            review_by_reservation: DashMap::new(),
        }
    }

    // ── Rooms ────────────────────────────────────────────────

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn get_room(&self, id: &Ulid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn insert_room(&self, id: Ulid, state: SharedRoomState) {
        self.rooms.insert(id, state);
    }

    pub fn remove_room(&self, id: &Ulid) -> Option<(Ulid, SharedRoomState)> {
        self.rooms.remove(id)
    }

    pub fn room_ids(&self) -> Vec<Ulid> {
        self.rooms.iter().map(|e| *e.key()).collect()
    }

    /// Reserve a room number for `id`. False if another room holds it.
    pub fn claim_room_number(&self, number: &str, id: Ulid) -> bool {
        let mut claimed = false;
        self.room_numbers
            .entry(number.to_string())
            .and_modify(|owner| claimed = *owner == id)
            .or_insert_with(|| {
                claimed = true;
                id
            });
        claimed
    }

    pub fn release_room_number(&self, number: &str, id: Ulid) {
        self.room_numbers.remove_if(number, |_, owner| *owner == id);
    }

    /// Drop every index entry that points into a room about to be removed.
    pub fn forget_room(&self, rs: &RoomState) {
        self.release_room_number(&rs.room.room_number, rs.id());
        for r in &rs.reservations {
            self.reservation_to_room.remove(&r.id);
        }
    }

    // ── Reservation index ────────────────────────────────────

    pub fn room_for_reservation(&self, reservation_id: &Ulid) -> Option<Ulid> {
        self.reservation_to_room.get(reservation_id).map(|e| *e.value())
    }

    pub fn reservation_count(&self) -> usize {
        self.reservation_to_room.len()
    }

    /// The slot for an idempotency key, created empty on first use.
    pub fn idempotency_slot(&self, key: &str) -> IdempotencySlot {
        self.idempotency
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .value()
            .clone()
    }

    /// Drop a key's slot unless a request is still holding it.
    pub fn release_idempotency_slot(&self, key: &str) {
        self.idempotency
            .remove_if(key, |_, slot| Arc::strong_count(slot) == 1);
    }

    pub fn idempotency_key_count(&self) -> usize {
        self.idempotency.len()
    }

    fn remember_idempotency(&self, key: &str, reservation_id: Ulid) {
        let slot = self.idempotency_slot(key);
        // A live booking holds the lock and records the id itself.
        if let Ok(mut guard) = slot.try_lock() {
            *guard = Some(reservation_id);
        }
    }

    // ── Services ─────────────────────────────────────────────

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn get_service(&self, id: &Ulid) -> Option<SharedServiceState> {
        self.services.get(id).map(|e| e.value().clone())
    }

    pub fn insert_service(&self, id: Ulid, state: SharedServiceState) {
        self.services.insert(id, state);
    }

    pub fn remove_service(&self, id: &Ulid) -> Option<(Ulid, SharedServiceState)> {
        self.services.remove(id)
    }

    pub fn service_ids(&self) -> Vec<Ulid> {
        self.services.iter().map(|e| *e.key()).collect()
    }

    pub fn service_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_service.get(booking_id).map(|e| *e.value())
    }

    pub fn forget_service(&self, ss: &ServiceState) {
        for b in &ss.bookings {
            self.booking_to_service.remove(&b.id);
        }
    }

    // ── Reviews ──────────────────────────────────────────────

    pub fn get_review(&self, id: &Ulid) -> Option<Review> {
        self.reviews.get(id).map(|e| e.value().clone())
    }

    pub fn review_for_reservation(&self, reservation_id: &Ulid) -> Option<Ulid> {
        self.review_by_reservation.get(reservation_id).map(|e| *e.value())
    }

    pub fn reviews(&self) -> Vec<Review> {
        self.reviews.iter().map(|e| e.value().clone()).collect()
    }

    fn verify_review(&self, reservation_id: &Ulid) {
        let Some(review_id) = self.review_for_reservation(reservation_id) else {
            return;
        };
        if let Some(mut review) = self.reviews.get_mut(&review_id) {
            review.is_verified = true;
        }
    }

    // ── Event application ────────────────────────────────────

    /// Apply a room-scoped event. Caller holds the room's write lock.
    pub fn apply_room_event(&self, rs: &mut RoomState, event: &Event) {
        match event {
            Event::RoomUpdated { room } => {
                if room.room_number != rs.room.room_number {
                    self.release_room_number(&rs.room.room_number, rs.id());
                    self.claim_room_number(&room.room_number, rs.id());
                }
                rs.room = room.clone();
            }
            Event::RoomStatusSet { status, .. } => rs.room.status = *status,
            Event::ReservationConfirmed {
                reservation,
                room_status,
            } => {
                if let Some(key) = &reservation.idempotency_key {
                    self.remember_idempotency(key, reservation.id);
                }
                self.reservation_to_room.insert(reservation.id, rs.id());
                rs.upsert_reservation(reservation.clone());
                rs.room.status = *room_status;
            }
            Event::ReservationUpdated {
                reservation,
                room_status,
            } => {
                rs.upsert_reservation(reservation.clone());
                rs.room.status = *room_status;
            }
            Event::ReservationMoved {
                reservation,
                from_room_id,
                from_room_status,
                room_status,
            } => {
                if rs.id() == *from_room_id {
                    rs.remove_reservation(reservation.id);
                    rs.room.status = *from_room_status;
                }
                if rs.id() == reservation.room_id {
                    self.reservation_to_room.insert(reservation.id, rs.id());
                    rs.upsert_reservation(reservation.clone());
                    rs.room.status = *room_status;
                }
            }
            Event::ReservationStatusChanged {
                id,
                status,
                room_status,
                at,
                ..
            } => {
                if let Some(r) = rs.reservation_mut(id) {
                    r.status = *status;
                    r.updated_at = *at;
                }
                rs.room.status = *room_status;
                if *status == ReservationStatus::CheckedOut {
                    self.verify_review(id);
                }
            }
            Event::PaymentStatusChanged {
                id,
                payment_status,
                at,
                ..
            } => {
                if let Some(r) = rs.reservation_mut(id) {
                    r.payment_status = *payment_status;
                    r.updated_at = *at;
                }
            }
            Event::ReservationDeleted { id, room_status, .. } => {
                if let Some(key) = rs.reservation(id).and_then(|r| r.idempotency_key.as_deref()) {
                    self.release_idempotency_slot(key);
                }
                rs.remove_reservation(*id);
                self.reservation_to_room.remove(id);
                rs.room.status = *room_status;
            }
            _ => {}
        }
    }

    /// Apply a service-scoped event. Caller holds the service's write lock.
    pub fn apply_service_event(&self, ss: &mut ServiceState, event: &Event) {
        match event {
            Event::ServiceUpdated { service } => ss.service = service.clone(),
            Event::ServiceBooked { booking } => {
                self.booking_to_service.insert(booking.id, booking.service_id);
                ss.insert_booking(booking.clone());
            }
            Event::ServiceBookingCancelled { id, .. } => {
                ss.remove_booking(*id);
                self.booking_to_service.remove(id);
            }
            _ => {}
        }
    }

    pub fn apply_review_event(&self, event: &Event) {
        match event {
            Event::ReviewCreated { review } | Event::ReviewUpdated { review } => {
                self.review_by_reservation
                    .insert(review.reservation_id, review.id);
                self.reviews.insert(review.id, review.clone());
            }
            Event::ReviewDeleted { id, reservation_id } => {
                self.reviews.remove(id);
                self.review_by_reservation
                    .remove_if(reservation_id, |_, review_id| review_id == id);
            }
            _ => {}
        }
    }
}
