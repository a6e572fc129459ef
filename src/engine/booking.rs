use std::time::Instant;

use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::conflict::{now_ms, room_accepts, service_refusal, today, validate_party, validate_slot, validate_stay};
use super::lifecycle::projected_status;
use super::{Engine, EngineError};

pub(super) fn validate_guest(guest: &Guest) -> Result<(), EngineError> {
    validate_contact(&guest.name, &guest.email)?;
    if guest.phone.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("phone number too long"));
    }
    let long_text = |t: &Option<String>| t.as_ref().is_some_and(|t| t.len() > MAX_TEXT_LEN);
    if long_text(&guest.address) || long_text(&guest.special_requests) {
        return Err(EngineError::LimitExceeded("guest details too long"));
    }
    Ok(())
}

pub(super) fn validate_contact(name: &str, email: &str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::Invalid("guest name is required"));
    }
    let email = email.trim();
    if email.len() < 3 || !email.contains('@') {
        return Err(EngineError::Invalid("guest email is invalid"));
    }
    if name.len() > MAX_NAME_LEN || email.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("guest name or email too long"));
    }
    Ok(())
}

/// Percentage off from the best offer running `on` the given day.
fn best_discount(service: &Service, on: chrono::NaiveDate) -> u8 {
    service
        .special_offers
        .iter()
        .filter(|o| o.is_current(on))
        .map(|o| o.discount.min(100))
        .max()
        .unwrap_or(0)
}

fn discounted(price: Amount, discount: u8) -> Amount {
    price.saturating_mul(Amount::from(100 - discount)) / 100
}

impl Engine {
    /// Book a room for a guest.
    ///
    /// With a room id the booking succeeds on that room or fails with
    /// `RoomUnavailable`. With a room type every free room of the type is
    /// tried in candidate order, each re-checked under its write lock, and
    /// `NoRoomAvailable` means all of them were taken.
    pub async fn book(&self, req: BookingRequest) -> Result<Reservation, EngineError> {
        let started = Instant::now();
        let result = match req.idempotency_key.clone() {
            Some(key) => self.book_idempotent(key, req).await,
            None => self.book_once(req).await,
        };
        let outcome = match &result {
            Ok(_) => "confirmed",
            Err(e) => e.label(),
        };
        metrics::counter!(observability::BOOKINGS_TOTAL, "outcome" => outcome).increment(1);
        metrics::histogram!(observability::BOOKING_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        match &result {
            Ok(r) => info!(
                "reservation {} confirmed: room {} {}..{}",
                r.id, r.room_id, r.check_in, r.check_out
            ),
            Err(e) if e.is_internal() => tracing::error!("booking failed: {e}"),
            Err(e) => warn!("booking rejected: {e}"),
        }
        result
    }

    /// Requests sharing a key run one at a time; later ones get the
    /// reservation the first one made.
    async fn book_idempotent(&self, key: String, req: BookingRequest) -> Result<Reservation, EngineError> {
        if key.is_empty() {
            return Err(EngineError::Invalid("idempotency key is empty"));
        }
        if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(EngineError::LimitExceeded("idempotency key too long"));
        }
        let slot = self.store.idempotency_slot(&key);
        let mut previous = slot.lock().await;
        if let Some(id) = *previous {
            match self.get_reservation(&id).await {
                Ok(existing) => {
                    debug!("idempotency key {key} replayed reservation {id}");
                    return Ok(existing);
                }
                // Deleted since; the key is free again.
                Err(_) => *previous = None,
            }
        }
        match self.book_once(req).await {
            Ok(reservation) => {
                *previous = Some(reservation.id);
                Ok(reservation)
            }
            Err(e) => {
                drop(previous);
                drop(slot);
                self.store.release_idempotency_slot(&key);
                Err(e)
            }
        }
    }

    async fn book_once(&self, req: BookingRequest) -> Result<Reservation, EngineError> {
        validate_guest(&req.guest)?;
        validate_party(req.number_of_guests)?;
        let span = validate_stay(req.check_in, req.check_out, Some(today()))?;
        let add_ons = self.price_add_ons(&req.add_ons).await?;

        match req.target {
            RoomTarget::Room(room_id) => {
                let mut guard = self.lock_room(&room_id).await?;
                if !room_accepts(&guard, &span, req.number_of_guests, None) {
                    return Err(EngineError::RoomUnavailable(room_id));
                }
                self.confirm(&mut guard, &req, span, add_ons).await
            }
            RoomTarget::Type(room_type) => {
                let candidates = self
                    .find_available_rooms(req.check_in, req.check_out, req.number_of_guests, Some(room_type))
                    .await?;
                for candidate in candidates {
                    let Ok(mut guard) = self.lock_room(&candidate.id).await else {
                        continue;
                    };
                    if !room_accepts(&guard, &span, req.number_of_guests, None) {
                        debug!("room {} taken before lock, trying next", candidate.room_number);
                        continue;
                    }
                    return self.confirm(&mut guard, &req, span, add_ons).await;
                }
                Err(EngineError::NoRoomAvailable)
            }
        }
    }

    /// Persist a new reservation on a room whose lock the caller holds and
    /// whose availability was just checked.
    async fn confirm(
        &self,
        rs: &mut RoomState,
        req: &BookingRequest,
        span: Span,
        add_ons: Vec<AddOn>,
    ) -> Result<Reservation, EngineError> {
        if rs.reservations.len() >= MAX_RESERVATIONS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many reservations on room"));
        }
        let now = now_ms();
        let add_ons_total: Amount = add_ons.iter().map(|a| a.price).sum();
        let reservation = Reservation {
            id: Ulid::new(),
            guest: req.guest.clone(),
            room_id: rs.id(),
            check_in: req.check_in,
            check_out: req.check_out,
            number_of_guests: req.number_of_guests,
            total_amount: stay_amount(&span, rs.room.price_per_night).saturating_add(add_ons_total),
            payment_status: PaymentStatus::Pending,
            status: ReservationStatus::Confirmed,
            add_ons,
            idempotency_key: req.idempotency_key.clone(),
            created_at: now,
            updated_at: now,
        };
        let room_status = projected_status(rs, None, Some((ReservationStatus::Confirmed, span)), now);
        let event = Event::ReservationConfirmed {
            reservation: reservation.clone(),
            room_status,
        };
        self.persist_room_event(rs, &event).await?;
        Ok(reservation)
    }

    /// Price add-ons at their service's price (less any running offer).
    async fn price_add_ons(&self, requests: &[AddOnRequest]) -> Result<Vec<AddOn>, EngineError> {
        if requests.len() > MAX_ADD_ONS {
            return Err(EngineError::LimitExceeded("too many add-ons"));
        }
        let today = today();
        let mut add_ons = Vec::with_capacity(requests.len());
        for req in requests {
            if req.quantity == 0 || req.quantity > MAX_PARTY_SIZE {
                return Err(EngineError::Invalid("add-on quantity out of range"));
            }
            let ss = self
                .store
                .get_service(&req.service)
                .ok_or(EngineError::ServiceUnavailable("add-on service is unknown"))?;
            let guard = ss.read().await;
            if !guard.service.is_active {
                return Err(EngineError::ServiceUnavailable("add-on service is not active"));
            }
            let unit = discounted(guard.service.price, best_discount(&guard.service, today));
            add_ons.push(AddOn {
                service_id: req.service,
                quantity: req.quantity,
                price: unit.saturating_mul(Amount::from(req.quantity)),
            });
        }
        Ok(add_ons)
    }

    // ── Service bookings ─────────────────────────────────────

    /// Book a service slot. Same shape as room booking: candidates are
    /// re-checked against capacity under each service's write lock.
    pub async fn book_service(&self, req: ServiceBookingRequest) -> Result<ServiceBooking, EngineError> {
        validate_slot(req.start, req.end)?;
        validate_party(req.guests)?;
        validate_contact(&req.guest_name, &req.guest_email)?;
        if let Some(reservation_id) = req.reservation_id {
            self.get_reservation(&reservation_id).await?;
        }

        let now = now_ms();
        let candidates = match req.target {
            ServiceTarget::Service(id) => vec![id],
            ServiceTarget::Type(t) => self
                .service_candidates(t, req.start, req.end, req.guests, now)
                .await
                .into_iter()
                .map(|s| s.id)
                .collect(),
        };

        let mut refusal = "no service available for that slot";
        for service_id in candidates {
            let mut guard = match self.lock_service(&service_id).await {
                Ok(guard) => guard,
                Err(e) if matches!(req.target, ServiceTarget::Service(_)) => return Err(e),
                Err(_) => continue,
            };
            if let Some(reason) = service_refusal(&guard, req.start, req.end, req.guests, now) {
                refusal = reason;
                continue;
            }
            if guard.bookings.len() >= MAX_BOOKINGS_PER_SERVICE {
                return Err(EngineError::LimitExceeded("too many bookings on service"));
            }

            let service = &guard.service;
            let unit = discounted(service.price, best_discount(service, req.start.date()));
            let booking = ServiceBooking {
                id: Ulid::new(),
                service_id,
                reservation_id: req.reservation_id,
                guest_name: req.guest_name.trim().to_string(),
                guest_email: req.guest_email.trim().to_string(),
                start: req.start,
                end: req.end,
                guests: req.guests,
                total_price: unit.saturating_mul(Amount::from(req.guests)),
                created_at: now,
            };
            let event = Event::ServiceBooked {
                booking: booking.clone(),
            };
            self.persist_service_event(&mut guard, &event).await?;
            metrics::counter!(observability::SERVICE_BOOKINGS_TOTAL, "outcome" => "confirmed").increment(1);
            info!("service booking {} on {} for {} guests", booking.id, service_id, booking.guests);
            return Ok(booking);
        }

        metrics::counter!(observability::SERVICE_BOOKINGS_TOTAL, "outcome" => "unavailable").increment(1);
        Err(EngineError::ServiceUnavailable(refusal))
    }

    pub async fn cancel_service_booking(&self, id: Ulid) -> Result<(), EngineError> {
        let mut guard = self.resolve_booking_write(&id).await?;
        let event = Event::ServiceBookingCancelled {
            id,
            service_id: guard.service.id,
        };
        self.persist_service_event(&mut guard, &event).await?;
        info!("service booking {id} cancelled");
        Ok(())
    }
}
