use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::engine::{now_ms, Engine};
use crate::intake::IntakePipeline;

/// Background task that re-derives room statuses as stays begin and end.
pub async fn run_reconciler(engine: Arc<Engine>, every: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        match engine.reconcile_room_statuses(now_ms()).await {
            Ok(0) => debug!("reconciler: no drift"),
            Ok(n) => info!("reconciler corrected {n} room statuses"),
            Err(e) => error!("reconciler failed: {e}"),
        }
    }
}

/// Background task that compacts the WAL once enough appends pile up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        let appends = engine.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match engine.compact_wal().await {
            Ok(()) => info!("compacted WAL after {appends} appends"),
            Err(e) => error!("WAL compaction failed: {e}"),
        }
    }
}

/// Background task that drops expired conversation sessions.
pub async fn run_session_sweeper(intake: Arc<IntakePipeline>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        if let Some(sessions) = intake.sessions() {
            let dropped = sessions.sweep();
            if dropped > 0 {
                debug!("swept {dropped} expired sessions");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("innkeep_test_reaper");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn tasks_stop_when_cancelled() {
        let engine = Arc::new(Engine::new(test_wal_path("cancelled.wal")).unwrap());
        let cancel = CancellationToken::new();
        let reconciler = tokio::spawn(run_reconciler(engine.clone(), Duration::from_millis(10), cancel.clone()));
        let compactor = tokio::spawn(run_compactor(engine, 1, cancel.clone()));

        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), reconciler).await.unwrap().unwrap();
        tokio::time::timeout(Duration::from_secs(5), compactor).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn compactor_runs_past_threshold() {
        let engine = Arc::new(Engine::new(test_wal_path("compactor.wal")).unwrap());
        for n in 0..3 {
            engine
                .create_room(NewRoom {
                    room_number: format!("10{n}"),
                    room_type: RoomType::Single,
                    capacity: 1,
                    price_per_night: 10_000,
                    floor: 1,
                    description: String::new(),
                    amenities: Vec::new(),
                })
                .await
                .unwrap();
        }
        let room = engine.list_rooms(&RoomFilter::default()).await.remove(0);
        let r = engine
            .book(BookingRequest {
                guest: Guest {
                    name: "Ada".into(),
                    email: "ada@example.com".into(),
                    phone: String::new(),
                    address: None,
                    special_requests: None,
                },
                target: RoomTarget::Room(room.id),
                check_in: NaiveDate::from_ymd_opt(2031, 3, 1).unwrap(),
                check_out: NaiveDate::from_ymd_opt(2031, 3, 2).unwrap(),
                number_of_guests: 1,
                add_ons: Vec::new(),
                idempotency_key: None,
            })
            .await
            .unwrap();
        engine.cancel(r.id).await.unwrap();
        assert_eq!(engine.wal_appends_since_compact().await, 5);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_compactor(engine.clone(), 5, cancel.clone()));
        // The first tick fires immediately.
        for _ in 0..100 {
            if engine.wal_appends_since_compact().await == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(engine.wal_appends_since_compact().await, 0);
        cancel.cancel();
        task.await.unwrap();
    }
}
