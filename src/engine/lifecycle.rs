use tracing::{info, warn};
use ulid::Ulid;

use crate::model::*;
use crate::observability;

use super::conflict::{check_no_conflict, now_ms, today, validate_party, validate_stay};
use super::{Engine, EngineError};

/// Room status as it would be with `skip` removed and `extra` added.
pub(super) fn projected_status(
    rs: &RoomState,
    skip: Option<Ulid>,
    extra: Option<(ReservationStatus, Span)>,
    now: Ms,
) -> RoomStatus {
    derive_room_status(
        rs.room.status,
        rs.reservations
            .iter()
            .filter(|r| Some(r.id) != skip)
            .map(|r| (r.status, r.span()))
            .chain(extra),
        now,
    )
}

/// Apply the stay fields of `patch` to a copy of `current` and validate the
/// result. The caller checks the target room.
fn restayed(current: &Reservation, patch: &ReservationPatch) -> Result<(Reservation, Span), EngineError> {
    if current.status.is_terminal() {
        return Err(EngineError::Invalid("only active reservations can be changed"));
    }
    let mut next = current.clone();
    if let Some(d) = patch.check_in {
        next.check_in = d;
    }
    if let Some(d) = patch.check_out {
        next.check_out = d;
    }
    if let Some(n) = patch.number_of_guests {
        validate_party(n)?;
        next.number_of_guests = n;
    }
    // A stay already under way keeps its past check-in; a new check-in date
    // must not be in the past.
    let not_before = (next.check_in != current.check_in).then(today);
    let span = validate_stay(next.check_in, next.check_out, not_before)?;
    Ok((next, span))
}

impl Engine {
    pub async fn check_in(&self, id: Ulid) -> Result<Reservation, EngineError> {
        self.transition(id, ReservationStatus::CheckedIn).await
    }

    pub async fn check_out(&self, id: Ulid) -> Result<Reservation, EngineError> {
        self.transition(id, ReservationStatus::CheckedOut).await
    }

    pub async fn cancel(&self, id: Ulid) -> Result<Reservation, EngineError> {
        self.transition(id, ReservationStatus::Cancelled).await
    }

    /// Move a reservation along the lifecycle and re-derive its room's status
    /// under the room's write lock.
    pub async fn transition(&self, id: Ulid, to: ReservationStatus) -> Result<Reservation, EngineError> {
        let mut guard = self.resolve_reservation_write(&id).await?;
        let current = guard.reservation(&id).ok_or(EngineError::NotFound(id))?;
        let from = current.status;
        if !from.can_transition_to(to) {
            warn!("reservation {id}: refused {from} -> {to}");
            return Err(EngineError::InvalidTransition { from, to });
        }

        let now = now_ms();
        let room_status = projected_status(&guard, Some(id), Some((to, current.span())), now);
        let event = Event::ReservationStatusChanged {
            id,
            room_id: guard.id(),
            status: to,
            room_status,
            at: now,
        };
        self.persist_room_event(&mut guard, &event).await?;
        metrics::counter!(observability::LIFECYCLE_TRANSITIONS_TOTAL, "to" => to.as_str()).increment(1);
        info!(
            "reservation {id}: {from} -> {to}, room {} now {room_status}",
            guard.room.room_number
        );
        guard.reservation(&id).cloned().ok_or(EngineError::NotFound(id))
    }

    /// Edit a reservation: stay fields first (dates, party size, room), then
    /// status, then payment status. Each part is atomic on its own.
    pub async fn update_reservation(
        &self,
        id: Ulid,
        patch: ReservationPatch,
    ) -> Result<Reservation, EngineError> {
        let mut reservation = self.get_reservation(&id).await?;
        if let Some(to) = patch.status
            && to != reservation.status
            && !reservation.status.can_transition_to(to)
        {
            return Err(EngineError::InvalidTransition {
                from: reservation.status,
                to,
            });
        }

        if patch.touches_stay() {
            reservation = self.update_stay(id, &patch).await?;
        }
        if let Some(to) = patch.status
            && to != reservation.status
        {
            reservation = self.transition(id, to).await?;
        }
        if let Some(payment) = patch.payment_status
            && payment != reservation.payment_status
        {
            reservation = self.set_payment_status(id, payment).await?;
        }
        Ok(reservation)
    }

    async fn update_stay(&self, id: Ulid, patch: &ReservationPatch) -> Result<Reservation, EngineError> {
        loop {
            let source_id = self
                .store
                .room_for_reservation(&id)
                .ok_or(EngineError::NotFound(id))?;
            let target_id = patch.room_id.unwrap_or(source_id);

            if target_id == source_id {
                let mut guard = self
                    .lock_room(&source_id)
                    .await
                    .map_err(|_| EngineError::NotFound(id))?;
                if guard.reservation(&id).is_none() {
                    continue; // moved while we waited
                }
                return self.restay_in_place(&mut guard, id, patch).await;
            }

            // Lock both rooms in id order.
            let source_first = source_id < target_id;
            let (first, second) = if source_first {
                (source_id, target_id)
            } else {
                (target_id, source_id)
            };
            let first = self.lock_room(&first).await;
            let second = self.lock_room(&second).await;
            let (source, target) = if source_first {
                (first, second)
            } else {
                (second, first)
            };
            let mut source = source.map_err(|_| EngineError::NotFound(id))?;
            let mut target = target?;
            if source.reservation(&id).is_none() {
                continue;
            }
            return self.move_reservation(&mut source, &mut target, id, patch).await;
        }
    }

    async fn restay_in_place(
        &self,
        rs: &mut RoomState,
        id: Ulid,
        patch: &ReservationPatch,
    ) -> Result<Reservation, EngineError> {
        let current = rs.reservation(&id).ok_or(EngineError::NotFound(id))?;
        let (mut next, span) = restayed(current, patch)?;
        if next.number_of_guests > rs.room.capacity {
            return Err(EngineError::RoomUnavailable(rs.id()));
        }
        check_no_conflict(rs, &span, Some(id))?;

        let now = now_ms();
        next.total_amount =
            stay_amount(&span, rs.room.price_per_night).saturating_add(next.add_ons_amount());
        next.updated_at = now;
        let room_status = projected_status(rs, Some(id), Some((next.status, span)), now);
        let event = Event::ReservationUpdated {
            reservation: next.clone(),
            room_status,
        };
        self.persist_room_event(rs, &event).await?;
        info!("reservation {id} changed to {}..{}", next.check_in, next.check_out);
        Ok(next)
    }

    async fn move_reservation(
        &self,
        source: &mut RoomState,
        target: &mut RoomState,
        id: Ulid,
        patch: &ReservationPatch,
    ) -> Result<Reservation, EngineError> {
        let current = source.reservation(&id).ok_or(EngineError::NotFound(id))?;
        let (mut next, span) = restayed(current, patch)?;
        if target.room.status == RoomStatus::Maintenance || next.number_of_guests > target.room.capacity {
            return Err(EngineError::RoomUnavailable(target.id()));
        }
        check_no_conflict(target, &span, None)?;

        let now = now_ms();
        next.room_id = target.id();
        next.total_amount =
            stay_amount(&span, target.room.price_per_night).saturating_add(next.add_ons_amount());
        next.updated_at = now;
        let event = Event::ReservationMoved {
            reservation: next.clone(),
            from_room_id: source.id(),
            from_room_status: projected_status(source, Some(id), None, now),
            room_status: projected_status(target, None, Some((next.status, span)), now),
        };
        self.wal_append(&event).await?;
        self.store.apply_room_event(source, &event);
        self.store.apply_room_event(target, &event);
        info!(
            "reservation {id} moved from room {} to room {}",
            source.room.room_number, target.room.room_number
        );
        Ok(next)
    }

    pub async fn set_payment_status(
        &self,
        id: Ulid,
        payment_status: PaymentStatus,
    ) -> Result<Reservation, EngineError> {
        let mut guard = self.resolve_reservation_write(&id).await?;
        let event = Event::PaymentStatusChanged {
            id,
            room_id: guard.id(),
            payment_status,
            at: now_ms(),
        };
        self.persist_room_event(&mut guard, &event).await?;
        guard.reservation(&id).cloned().ok_or(EngineError::NotFound(id))
    }

    /// Administrative hard delete. Releases the room like a cancellation;
    /// refused while a review points at the reservation.
    pub async fn delete_reservation(&self, id: Ulid) -> Result<(), EngineError> {
        let mut guard = self.resolve_reservation_write(&id).await?;
        if self.store.review_for_reservation(&id).is_some() {
            return Err(EngineError::ReferencedByReview(id));
        }
        let event = Event::ReservationDeleted {
            id,
            room_id: guard.id(),
            room_status: projected_status(&guard, Some(id), None, now_ms()),
        };
        self.persist_room_event(&mut guard, &event).await?;
        info!("reservation {id} deleted from room {}", guard.room.room_number);
        Ok(())
    }

    /// Re-derive every room's status at `now` and persist any that drifted
    /// (stays that ended or began since the last lifecycle event).
    pub async fn reconcile_room_statuses(&self, now: Ms) -> Result<usize, EngineError> {
        let mut fixed = 0;
        for room_id in self.store.room_ids() {
            let Ok(mut guard) = self.lock_room(&room_id).await else {
                continue;
            };
            let derived = guard.derived_status(now);
            if derived == guard.room.status {
                continue;
            }
            info!(
                "room {} status {} -> {derived}",
                guard.room.room_number, guard.room.status
            );
            let event = Event::RoomStatusSet {
                id: room_id,
                status: derived,
            };
            self.persist_room_event(&mut guard, &event).await?;
            fixed += 1;
        }
        metrics::counter!(observability::RECONCILE_CORRECTIONS_TOTAL).increment(fixed as u64);
        Ok(fixed)
    }
}
