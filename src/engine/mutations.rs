use std::sync::Arc;

use tokio::sync::{oneshot, RwLock};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::now_ms;
use super::{Engine, EngineError, WalCommand};

fn validate_name(name: &str, what: &'static str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::Invalid(what));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

fn validate_room(room: &Room) -> Result<(), EngineError> {
    validate_name(&room.room_number, "room number is required")?;
    if room.capacity == 0 {
        return Err(EngineError::Invalid("capacity must be at least 1"));
    }
    if room.capacity > MAX_PARTY_SIZE {
        return Err(EngineError::LimitExceeded("capacity too large"));
    }
    if room.price_per_night == 0 {
        return Err(EngineError::Invalid("price per night must be positive"));
    }
    if room.description.len() > MAX_TEXT_LEN {
        return Err(EngineError::LimitExceeded("description too long"));
    }
    if room.amenities.len() > MAX_AMENITIES || room.amenities.iter().any(|a| a.len() > MAX_NAME_LEN) {
        return Err(EngineError::LimitExceeded("too many or too long amenities"));
    }
    Ok(())
}

fn validate_service(service: &Service) -> Result<(), EngineError> {
    validate_name(&service.name, "service name is required")?;
    if service.description.len() > MAX_TEXT_LEN {
        return Err(EngineError::LimitExceeded("description too long"));
    }
    let avail = &service.availability;
    if let (Some(open), Some(close)) = (avail.start_time, avail.end_time)
        && open >= close
    {
        return Err(EngineError::Invalid("opening time must be before closing time"));
    }
    if avail.max_capacity == Some(0) {
        return Err(EngineError::Invalid("max capacity must be at least 1"));
    }
    if service.special_offers.len() > MAX_SPECIAL_OFFERS {
        return Err(EngineError::LimitExceeded("too many special offers"));
    }
    for offer in &service.special_offers {
        validate_name(&offer.name, "offer name is required")?;
        if offer.discount > 100 {
            return Err(EngineError::Invalid("discount must be between 0 and 100"));
        }
        if let (Some(from), Some(until)) = (offer.valid_from, offer.valid_until)
            && from > until
        {
            return Err(EngineError::Invalid("offer validity window is reversed"));
        }
    }
    let req = &service.requirements;
    if req.minimum_guests == 0 {
        return Err(EngineError::Invalid("minimum guests must be at least 1"));
    }
    if req.maximum_guests.is_some_and(|max| max < req.minimum_guests) {
        return Err(EngineError::Invalid("maximum guests is below minimum guests"));
    }
    Ok(())
}

impl Engine {
    // ── Rooms ────────────────────────────────────────────────

    pub async fn create_room(&self, new: NewRoom) -> Result<Room, EngineError> {
        let room = Room {
            id: Ulid::new(),
            room_number: new.room_number.trim().to_string(),
            room_type: new.room_type,
            capacity: new.capacity,
            price_per_night: new.price_per_night,
            status: RoomStatus::Available,
            floor: new.floor,
            description: new.description,
            amenities: new.amenities,
        };
        validate_room(&room)?;

        let _catalog = self.catalog.lock().await;
        if self.store.room_count() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        if !self.store.claim_room_number(&room.room_number, room.id) {
            return Err(EngineError::AlreadyExists(room.room_number));
        }

        let event = Event::RoomCreated { room: room.clone() };
        if let Err(e) = self.wal_append(&event).await {
            self.store.release_room_number(&room.room_number, room.id);
            return Err(e);
        }
        self.store
            .insert_room(room.id, Arc::new(RwLock::new(RoomState::new(room.clone()))));
        tracing::info!("room {} created ({})", room.room_number, room.id);
        Ok(room)
    }

    /// Edit a room. `status` accepts only `maintenance` and `available`;
    /// returning a room to service re-derives its status from its reservations.
    pub async fn update_room(&self, id: Ulid, patch: RoomPatch) -> Result<Room, EngineError> {
        let mut guard = self.lock_room(&id).await?;

        let mut room = guard.room.clone();
        if let Some(number) = patch.room_number {
            room.room_number = number.trim().to_string();
        }
        if let Some(t) = patch.room_type {
            room.room_type = t;
        }
        if let Some(c) = patch.capacity {
            room.capacity = c;
        }
        if let Some(p) = patch.price_per_night {
            room.price_per_night = p;
        }
        if let Some(f) = patch.floor {
            room.floor = f;
        }
        if let Some(d) = patch.description {
            room.description = d;
        }
        if let Some(a) = patch.amenities {
            room.amenities = a;
        }
        match patch.status {
            None => {}
            Some(RoomStatus::Maintenance) => room.status = RoomStatus::Maintenance,
            Some(RoomStatus::Available) => {
                room.status = derive_room_status(
                    RoomStatus::Available,
                    guard.reservations.iter().map(|r| (r.status, r.span())),
                    now_ms(),
                );
            }
            Some(_) => {
                return Err(EngineError::Invalid(
                    "room status can only be set to maintenance or available",
                ));
            }
        }
        validate_room(&room)?;

        let renumbered = room.room_number != guard.room.room_number;
        if renumbered && !self.store.claim_room_number(&room.room_number, id) {
            return Err(EngineError::AlreadyExists(room.room_number));
        }

        let event = Event::RoomUpdated { room: room.clone() };
        if let Err(e) = self.persist_room_event(&mut guard, &event).await {
            if renumbered {
                self.store.release_room_number(&room.room_number, id);
            }
            return Err(e);
        }
        Ok(room)
    }

    /// Remove a room. Refused while it holds an active reservation or any of
    /// its reservations is reviewed.
    pub async fn delete_room(&self, id: Ulid) -> Result<(), EngineError> {
        let _catalog = self.catalog.lock().await;
        let rs = self.store.get_room(&id).ok_or(EngineError::RoomNotFound(id))?;
        let guard = rs.write().await;
        if guard.has_active_reservations() {
            return Err(EngineError::InUse(id));
        }
        if let Some(r) = guard
            .reservations
            .iter()
            .find(|r| self.store.review_for_reservation(&r.id).is_some())
        {
            return Err(EngineError::ReferencedByReview(r.id));
        }

        let event = Event::RoomDeleted { id };
        self.wal_append(&event).await?;
        self.store.forget_room(&guard);
        self.store.remove_room(&id);
        tracing::info!("room {} deleted ({id})", guard.room.room_number);
        Ok(())
    }

    // ── Services ─────────────────────────────────────────────

    pub async fn create_service(&self, new: NewService) -> Result<Service, EngineError> {
        let service = Service {
            id: Ulid::new(),
            name: new.name.trim().to_string(),
            service_type: new.service_type,
            description: new.description,
            price: new.price,
            availability: new.availability,
            is_active: new.is_active,
            special_offers: new.special_offers,
            requirements: new.requirements,
        };
        validate_service(&service)?;

        let _catalog = self.catalog.lock().await;
        if self.store.service_count() >= MAX_SERVICES {
            return Err(EngineError::LimitExceeded("too many services"));
        }
        let event = Event::ServiceCreated {
            service: service.clone(),
        };
        self.wal_append(&event).await?;
        self.store.insert_service(
            service.id,
            Arc::new(RwLock::new(ServiceState::new(service.clone()))),
        );
        tracing::info!("service {} created ({})", service.name, service.id);
        Ok(service)
    }

    pub async fn update_service(&self, id: Ulid, patch: ServicePatch) -> Result<Service, EngineError> {
        let mut guard = self.lock_service(&id).await?;

        let mut service = guard.service.clone();
        if let Some(n) = patch.name {
            service.name = n.trim().to_string();
        }
        if let Some(d) = patch.description {
            service.description = d;
        }
        if let Some(p) = patch.price {
            service.price = p;
        }
        if let Some(a) = patch.availability {
            service.availability = a;
        }
        if let Some(a) = patch.is_active {
            service.is_active = a;
        }
        if let Some(o) = patch.special_offers {
            service.special_offers = o;
        }
        if let Some(r) = patch.requirements {
            service.requirements = r;
        }
        validate_service(&service)?;

        let event = Event::ServiceUpdated {
            service: service.clone(),
        };
        self.persist_service_event(&mut guard, &event).await?;
        Ok(service)
    }

    /// Remove a service. Refused while bookings for slots not yet ended remain.
    pub async fn delete_service(&self, id: Ulid) -> Result<(), EngineError> {
        let _catalog = self.catalog.lock().await;
        let ss = self.store.get_service(&id).ok_or(EngineError::NotFound(id))?;
        let guard = ss.write().await;
        let now = now_ms();
        if guard.bookings.iter().any(|b| b.span().end > now) {
            return Err(EngineError::InUse(id));
        }

        let event = Event::ServiceDeleted { id };
        self.wal_append(&event).await?;
        self.store.forget_service(&guard);
        self.store.remove_service(&id);
        tracing::info!("service {} deleted ({id})", guard.service.name);
        Ok(())
    }

    // ── WAL maintenance ──────────────────────────────────────

    /// Compact the WAL by rewriting it with only the events needed to recreate
    /// the current state.
    ///
    /// Every room and service stays read-locked until the rewritten log is in
    /// place, so no event can land in the old log after its snapshot was taken.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _catalog = self.catalog.lock().await;

        let mut room_ids = self.store.room_ids();
        room_ids.sort();
        let mut service_ids = self.store.service_ids();
        service_ids.sort();

        let mut room_guards = Vec::with_capacity(room_ids.len());
        for id in &room_ids {
            if let Some(rs) = self.store.get_room(id) {
                room_guards.push(rs.read_owned().await);
            }
        }
        let mut service_guards = Vec::with_capacity(service_ids.len());
        for id in &service_ids {
            if let Some(ss) = self.store.get_service(id) {
                service_guards.push(ss.read_owned().await);
            }
        }

        let mut events = Vec::new();
        for rs in &room_guards {
            events.push(Event::RoomCreated {
                room: rs.room.clone(),
            });
            for reservation in &rs.reservations {
                events.push(Event::ReservationConfirmed {
                    reservation: reservation.clone(),
                    room_status: rs.room.status,
                });
            }
        }
        for ss in &service_guards {
            events.push(Event::ServiceCreated {
                service: ss.service.clone(),
            });
            for booking in &ss.bookings {
                events.push(Event::ServiceBooked {
                    booking: booking.clone(),
                });
            }
        }
        for review in self.store.reviews() {
            events.push(Event::ReviewCreated { review });
        }

        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        tracing::info!("WAL compacted to {count} events");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
