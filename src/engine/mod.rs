mod availability;
mod booking;
mod conflict;
mod error;
mod lifecycle;
mod mutations;
mod queries;
mod reviews;
mod store;
#[cfg(test)]
mod tests;

pub use availability::{free_windows, merge_overlapping, peak_load, subtract_intervals};
pub use conflict::{now_ms, today};
pub use error::EngineError;
pub use store::InMemoryStore;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex, OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::wal::Wal;

pub type SharedRoomState = Arc<RwLock<RoomState>>;
pub type SharedServiceState = Arc<RwLock<ServiceState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends.
/// 4. One flush_sync for the whole batch, then answer every sender.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }
                commit_batch(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<PendingAppend>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::error!("WAL flush failed for batch of {}: {e}", batch.len());
    }
    respond_batch(batch, &result);
}

fn flush_batch(wal: &mut Wal, batch: &[PendingAppend]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after an append error so half-buffered bytes do not leak
    // into the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn respond_batch(batch: &mut Vec<PendingAppend>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result =
                Wal::write_compact_file(wal.path(), &events).and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let mut batch = vec![(event, response)];
            commit_batch(wal, &mut batch);
        }
    }
}

/// The booking engine: in-memory hotel state backed by the WAL.
///
/// Every mutation takes the write lock of each room (or service) it touches,
/// re-validates against the locked state, appends its event and applies it
/// before releasing. Two requests for the same room therefore serialize, and
/// the second sees the first's reservation.
pub struct Engine {
    pub store: InMemoryStore,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Held while rooms or services are created or deleted, and for the
    /// whole of a compaction.
    pub(super) catalog: Mutex<()>,
}

impl Engine {
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let (wal, events) = Wal::recover(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            store: InMemoryStore::new(),
            wal_tx,
            catalog: Mutex::new(()),
        };

        // Replay owns every Arc, so try_write never contends.
        for event in &events {
            engine.replay_event(event);
        }
        tracing::info!(
            "replayed {} events: {} rooms, {} reservations, {} services",
            events.len(),
            engine.store.room_count(),
            engine.store.reservation_count(),
            engine.store.service_count()
        );

        Ok(engine)
    }

    fn replay_event(&self, event: &Event) {
        match event {
            Event::RoomCreated { room } => {
                self.store.claim_room_number(&room.room_number, room.id);
                self.store
                    .insert_room(room.id, Arc::new(RwLock::new(RoomState::new(room.clone()))));
            }
            Event::RoomDeleted { id } => {
                if let Some((_, rs)) = self.store.remove_room(id) {
                    let guard = rs.try_read().expect("replay: uncontended read");
                    self.store.forget_room(&guard);
                }
            }
            Event::ServiceCreated { service } => {
                self.store.insert_service(
                    service.id,
                    Arc::new(RwLock::new(ServiceState::new(service.clone()))),
                );
            }
            Event::ServiceDeleted { id } => {
                if let Some((_, ss)) = self.store.remove_service(id) {
                    let guard = ss.try_read().expect("replay: uncontended read");
                    self.store.forget_service(&guard);
                }
            }
            Event::ReviewCreated { .. } | Event::ReviewUpdated { .. } | Event::ReviewDeleted { .. } => {
                self.store.apply_review_event(event);
            }
            other => {
                for room_id in event_room_ids(other) {
                    if let Some(rs) = self.store.get_room(&room_id) {
                        let mut guard = rs.try_write().expect("replay: uncontended write");
                        self.store.apply_room_event(&mut guard, other);
                    }
                }
                if let Some(service_id) = event_service_id(other)
                    && let Some(ss) = self.store.get_service(&service_id)
                {
                    let mut guard = ss.try_write().expect("replay: uncontended write");
                    self.store.apply_service_event(&mut guard, other);
                }
            }
        }
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append then apply to a locked room.
    pub(super) async fn persist_room_event(
        &self,
        rs: &mut RoomState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.store.apply_room_event(rs, event);
        Ok(())
    }

    /// WAL-append then apply to a locked service.
    pub(super) async fn persist_service_event(
        &self,
        ss: &mut ServiceState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.store.apply_service_event(ss, event);
        Ok(())
    }

    /// Write-lock a room, failing if it was deleted while we waited.
    pub(super) async fn lock_room(
        &self,
        id: &Ulid,
    ) -> Result<OwnedRwLockWriteGuard<RoomState>, EngineError> {
        let rs = self.store.get_room(id).ok_or(EngineError::RoomNotFound(*id))?;
        let guard = rs.write_owned().await;
        if self.store.get_room(id).is_none() {
            return Err(EngineError::RoomNotFound(*id));
        }
        Ok(guard)
    }

    /// Write-lock a service, failing if it was deleted while we waited.
    pub(super) async fn lock_service(
        &self,
        id: &Ulid,
    ) -> Result<OwnedRwLockWriteGuard<ServiceState>, EngineError> {
        let ss = self.store.get_service(id).ok_or(EngineError::NotFound(*id))?;
        let guard = ss.write_owned().await;
        if self.store.get_service(id).is_none() {
            return Err(EngineError::NotFound(*id));
        }
        Ok(guard)
    }

    /// Lookup reservation → room, acquire the room's write lock.
    ///
    /// A concurrent move can relocate the reservation between the index
    /// lookup and the lock, so the lookup is repeated until it is stable.
    pub(super) async fn resolve_reservation_write(
        &self,
        reservation_id: &Ulid,
    ) -> Result<OwnedRwLockWriteGuard<RoomState>, EngineError> {
        loop {
            let room_id = self
                .store
                .room_for_reservation(reservation_id)
                .ok_or(EngineError::NotFound(*reservation_id))?;
            let guard = self
                .lock_room(&room_id)
                .await
                .map_err(|_| EngineError::NotFound(*reservation_id))?;
            if guard.reservation(reservation_id).is_some() {
                return Ok(guard);
            }
            if self.store.room_for_reservation(reservation_id) == Some(room_id) {
                return Err(EngineError::NotFound(*reservation_id));
            }
        }
    }

    /// Lookup service booking → service, acquire the service's write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<OwnedRwLockWriteGuard<ServiceState>, EngineError> {
        let service_id = self
            .store
            .service_for_booking(booking_id)
            .ok_or(EngineError::NotFound(*booking_id))?;
        let guard = self
            .lock_service(&service_id)
            .await
            .map_err(|_| EngineError::NotFound(*booking_id))?;
        if !guard.bookings.iter().any(|b| &b.id == booking_id) {
            return Err(EngineError::NotFound(*booking_id));
        }
        Ok(guard)
    }
}

/// Rooms whose state an event changes (both ends of a move).
fn event_room_ids(event: &Event) -> Vec<Ulid> {
    match event {
        Event::RoomUpdated { room } => vec![room.id],
        Event::RoomStatusSet { id, .. } => vec![*id],
        Event::ReservationConfirmed { reservation, .. }
        | Event::ReservationUpdated { reservation, .. } => vec![reservation.room_id],
        Event::ReservationMoved {
            reservation,
            from_room_id,
            ..
        } => vec![*from_room_id, reservation.room_id],
        Event::ReservationStatusChanged { room_id, .. }
        | Event::PaymentStatusChanged { room_id, .. }
        | Event::ReservationDeleted { room_id, .. } => vec![*room_id],
        _ => Vec::new(),
    }
}

fn event_service_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::ServiceUpdated { service } => Some(service.id),
        Event::ServiceBooked { booking } => Some(booking.service_id),
        Event::ServiceBookingCancelled { service_id, .. } => Some(*service_id),
        _ => None,
    }
}
