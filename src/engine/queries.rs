use chrono::{NaiveDate, NaiveDateTime};
use ulid::Ulid;

use crate::model::*;

use super::availability::{free_windows, room_order, service_order};
use super::conflict::{check_no_conflict, now_ms, service_refusal, validate_party, validate_slot, validate_window};
use super::{Engine, EngineError};

impl Engine {
    // ── Rooms ────────────────────────────────────────────────

    pub async fn get_room(&self, id: &Ulid) -> Result<Room, EngineError> {
        let rs = self.store.get_room(id).ok_or(EngineError::RoomNotFound(*id))?;
        let guard = rs.read().await;
        Ok(guard.room.clone())
    }

    /// Rooms matching `filter`, by room number.
    pub async fn list_rooms(&self, filter: &RoomFilter) -> Vec<Room> {
        let mut rooms = Vec::new();
        for id in self.store.room_ids() {
            let Some(rs) = self.store.get_room(&id) else {
                continue;
            };
            let guard = rs.read().await;
            if filter.matches(&guard.room) {
                rooms.push(guard.room.clone());
            }
        }
        rooms.sort_by(|a, b| a.room_number.cmp(&b.room_number).then(a.id.cmp(&b.id)));
        rooms
    }

    /// Rooms that could take a party of `min_capacity` for the stay, cheapest
    /// first. Advisory: bookings re-check under the room's lock.
    pub async fn find_available_rooms(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
        min_capacity: u32,
        room_type: Option<RoomType>,
    ) -> Result<Vec<Room>, EngineError> {
        let query = validate_window(check_in, check_out)?;
        let mut rooms = Vec::new();
        for id in self.store.room_ids() {
            let Some(rs) = self.store.get_room(&id) else {
                continue;
            };
            let guard = rs.read().await;
            let room = &guard.room;
            if room.status == RoomStatus::Maintenance
                || room.capacity < min_capacity
                || room_type.is_some_and(|t| t != room.room_type)
            {
                continue;
            }
            if check_no_conflict(&guard, &query, None).is_ok() {
                rooms.push(room.clone());
            }
        }
        rooms.sort_by(room_order);
        Ok(rooms)
    }

    /// Free windows of one room inside `[from, to)`.
    pub async fn room_calendar(
        &self,
        room_id: &Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<FreeWindow>, EngineError> {
        let query = validate_window(from, to)?;
        let rs = self.store.get_room(room_id).ok_or(EngineError::RoomNotFound(*room_id))?;
        let guard = rs.read().await;
        Ok(free_windows(&guard, &query)
            .into_iter()
            .filter_map(|span| {
                Some(FreeWindow {
                    from: ms_date(span.start)?,
                    to: ms_date(span.end)?,
                })
            })
            .collect())
    }

    // ── Reservations ─────────────────────────────────────────

    pub async fn get_reservation(&self, id: &Ulid) -> Result<Reservation, EngineError> {
        let room_id = self
            .store
            .room_for_reservation(id)
            .ok_or(EngineError::NotFound(*id))?;
        let rs = self.store.get_room(&room_id).ok_or(EngineError::NotFound(*id))?;
        let guard = rs.read().await;
        guard.reservation(id).cloned().ok_or(EngineError::NotFound(*id))
    }

    /// Reservations matching `filter`, by check-in date.
    pub async fn list_reservations(&self, filter: &ReservationFilter) -> Vec<Reservation> {
        let mut out = Vec::new();
        for id in self.store.room_ids() {
            let Some(rs) = self.store.get_room(&id) else {
                continue;
            };
            let guard = rs.read().await;
            out.extend(guard.reservations.iter().filter(|r| filter.matches(r)).cloned());
        }
        out.sort_by(|a, b| a.check_in.cmp(&b.check_in).then(a.id.cmp(&b.id)));
        out
    }

    // ── Services ─────────────────────────────────────────────

    pub async fn get_service(&self, id: &Ulid) -> Result<Service, EngineError> {
        let ss = self.store.get_service(id).ok_or(EngineError::NotFound(*id))?;
        let guard = ss.read().await;
        Ok(guard.service.clone())
    }

    pub async fn list_services(&self, filter: &ServiceFilter) -> Vec<Service> {
        let mut services = Vec::new();
        for id in self.store.service_ids() {
            let Some(ss) = self.store.get_service(&id) else {
                continue;
            };
            let guard = ss.read().await;
            if filter.matches(&guard.service) {
                services.push(guard.service.clone());
            }
        }
        services.sort_by(service_order);
        services
    }

    /// The first service of `service_type` (cheapest, then by name) that can
    /// take `guests` for the slot.
    pub async fn find_available_service(
        &self,
        service_type: ServiceType,
        start: NaiveDateTime,
        end: NaiveDateTime,
        guests: u32,
    ) -> Result<Service, EngineError> {
        validate_slot(start, end)?;
        validate_party(guests)?;
        self.service_candidates(service_type, start, end, guests, now_ms())
            .await
            .into_iter()
            .next()
            .ok_or(EngineError::ServiceUnavailable("no service available for that slot"))
    }

    pub(super) async fn service_candidates(
        &self,
        service_type: ServiceType,
        start: NaiveDateTime,
        end: NaiveDateTime,
        guests: u32,
        now: Ms,
    ) -> Vec<Service> {
        let mut candidates = Vec::new();
        for id in self.store.service_ids() {
            let Some(ss) = self.store.get_service(&id) else {
                continue;
            };
            let guard = ss.read().await;
            if guard.service.service_type == service_type
                && service_refusal(&guard, start, end, guests, now).is_none()
            {
                candidates.push(guard.service.clone());
            }
        }
        candidates.sort_by(service_order);
        candidates
    }

    /// Bookings of one service, or of every service, by slot start.
    pub async fn list_service_bookings(
        &self,
        service_id: Option<Ulid>,
    ) -> Result<Vec<ServiceBooking>, EngineError> {
        let ids = match service_id {
            Some(id) => {
                if self.store.get_service(&id).is_none() {
                    return Err(EngineError::NotFound(id));
                }
                vec![id]
            }
            None => self.store.service_ids(),
        };
        let mut out = Vec::new();
        for id in ids {
            let Some(ss) = self.store.get_service(&id) else {
                continue;
            };
            let guard = ss.read().await;
            out.extend(guard.bookings.iter().cloned());
        }
        out.sort_by(|a, b| a.start.cmp(&b.start).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    // ── Reviews ──────────────────────────────────────────────

    pub fn get_review(&self, id: &Ulid) -> Result<Review, EngineError> {
        self.store.get_review(id).ok_or(EngineError::NotFound(*id))
    }

    /// Reviews matching `filter`, newest first.
    pub fn list_reviews(&self, filter: &ReviewFilter) -> Vec<Review> {
        let mut reviews: Vec<Review> = self
            .store
            .reviews()
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        reviews
    }

    // ── Context for the conversational assistant ────────────

    /// Room types with their lowest price and tonight's free count, plus the
    /// active services and their current offers.
    pub async fn hotel_snapshot(&self, today: NaiveDate) -> HotelSnapshot {
        let tonight = today
            .succ_opt()
            .map(|tomorrow| Span::of_stay(today, tomorrow));

        let mut rooms: Vec<RoomTypeSummary> = Vec::new();
        for id in self.store.room_ids() {
            let Some(rs) = self.store.get_room(&id) else {
                continue;
            };
            let guard = rs.read().await;
            let room = &guard.room;
            if room.status == RoomStatus::Maintenance {
                continue;
            }
            let free_tonight = tonight
                .as_ref()
                .is_some_and(|span| check_no_conflict(&guard, span, None).is_ok());
            let idx = match rooms.iter().position(|s| s.room_type == room.room_type) {
                Some(idx) => idx,
                None => {
                    rooms.push(RoomTypeSummary {
                        room_type: room.room_type,
                        price_from: room.price_per_night,
                        max_capacity: room.capacity,
                        available_tonight: 0,
                    });
                    rooms.len() - 1
                }
            };
            let summary = &mut rooms[idx];
            summary.price_from = summary.price_from.min(room.price_per_night);
            summary.max_capacity = summary.max_capacity.max(room.capacity);
            if free_tonight {
                summary.available_tonight += 1;
            }
        }
        rooms.sort_by_key(|s| s.room_type);

        let services = self
            .list_services(&ServiceFilter {
                is_active: Some(true),
                ..ServiceFilter::default()
            })
            .await
            .into_iter()
            .map(|s| ServiceSummary {
                offers: s
                    .special_offers
                    .into_iter()
                    .filter(|o| o.is_current(today))
                    .collect(),
                name: s.name,
                service_type: s.service_type,
                price: s.price,
                days: s.availability.days,
            })
            .collect();

        HotelSnapshot {
            today,
            rooms,
            services,
        }
    }
}
