use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};
use ulid::Ulid;

use innkeep::engine::{Engine, EngineError};
use innkeep::model::*;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

fn fresh_engine(label: &str) -> Arc<Engine> {
    let dir = std::env::temp_dir().join(format!("innkeep_bench_{label}_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).expect("bench dir");
    Arc::new(Engine::new(dir.join("innkeep.wal")).expect("engine"))
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2031, 1, 1).expect("valid date")
}

fn night(offset: u64) -> (NaiveDate, NaiveDate) {
    let check_in = base_date() + Days::new(offset);
    (check_in, check_in + Days::new(1))
}

fn request(target: RoomTarget, offset: u64) -> BookingRequest {
    let (check_in, check_out) = night(offset);
    BookingRequest {
        guest: Guest {
            name: "Bench Guest".into(),
            email: "bench@example.com".into(),
            phone: String::new(),
            address: None,
            special_requests: None,
        },
        target,
        check_in,
        check_out,
        number_of_guests: 1,
        add_ons: Vec::new(),
        idempotency_key: None,
    }
}

async fn setup(engine: &Engine, per_type: usize) -> Vec<Room> {
    let mut rooms = Vec::new();
    for (t, room_type) in RoomType::ALL.iter().enumerate() {
        for n in 0..per_type {
            let room = engine
                .create_room(NewRoom {
                    room_number: format!("{}{:02}", t + 1, n),
                    room_type: *room_type,
                    capacity: 2,
                    price_per_night: 10_000 * (t as u64 + 1),
                    floor: t as i32 + 1,
                    description: String::new(),
                    amenities: Vec::new(),
                })
                .await
                .expect("create room");
            rooms.push(room);
        }
    }
    rooms
}

async fn phase1_sequential() {
    let engine = fresh_engine("seq");
    let rooms = setup(&engine, 1).await;
    let room = rooms[0].id;

    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();
    for i in 0..n {
        let t = Instant::now();
        engine
            .book(request(RoomTarget::Room(room), i as u64))
            .await
            .expect("sequential booking");
        latencies.push(t.elapsed());
    }
    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("book latency", &mut latencies);
}

async fn phase2_concurrent() {
    let engine = fresh_engine("concurrent");
    let rooms = setup(&engine, 10).await;

    let n_tasks = rooms.len();
    let n_per_task = 200;
    let start = Instant::now();
    let mut handles = Vec::new();
    for room in &rooms {
        let engine = engine.clone();
        let id = room.id;
        handles.push(tokio::spawn(async move {
            for j in 0..n_per_task {
                engine
                    .book(request(RoomTarget::Room(id), j))
                    .await
                    .expect("concurrent booking");
            }
        }));
    }
    for h in handles {
        h.await.expect("task");
    }
    let elapsed = start.elapsed();
    let total = n_tasks as u64 * n_per_task;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} tasks x {n_per_task} bookings = {total} total in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
}

async fn phase3_search_under_load() {
    let engine = fresh_engine("search");
    let rooms = setup(&engine, 20).await;
    let writer_rooms: Vec<Ulid> = rooms.iter().map(|r| r.id).collect();

    let writer = {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut written = 0u64;
            for j in 0..100 {
                for id in &writer_rooms {
                    if engine.book(request(RoomTarget::Room(*id), j)).await.is_ok() {
                        written += 1;
                    }
                }
            }
            written
        })
    };

    let mut latencies = Vec::new();
    while !writer.is_finished() {
        let (check_in, _) = night(latencies.len() as u64 % 100);
        let t = Instant::now();
        engine
            .find_available_rooms(check_in, check_in + Days::new(3), 1, None)
            .await
            .expect("search");
        latencies.push(t.elapsed());
        tokio::task::yield_now().await;
    }
    let written = writer.await.expect("writer");
    println!("  writer committed {written} bookings");
    print_latency("availability search latency", &mut latencies);
}

async fn phase4_contention() {
    let engine = fresh_engine("contention");
    setup(&engine, 3).await;

    let n_tasks = 64;
    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..n_tasks {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.book(request(RoomTarget::Type(RoomType::Suite), 0)).await
        }));
    }
    let (mut won, mut full) = (0, 0);
    for h in handles {
        match h.await.expect("task") {
            Ok(_) => won += 1,
            Err(EngineError::NoRoomAvailable) | Err(EngineError::RoomUnavailable(_)) => full += 1,
            Err(e) => println!("  unexpected error: {e}"),
        }
    }
    println!(
        "  {n_tasks} guests racing for 3 suites: {won} booked, {full} turned away in {:.2}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );
    assert_eq!(won, 3, "double booking under contention");
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    println!("=== innkeep stress benchmark ===\n");

    println!("[phase 1] sequential booking throughput");
    phase1_sequential().await;

    println!("\n[phase 2] concurrent booking throughput");
    phase2_concurrent().await;

    println!("\n[phase 3] availability search under write load");
    phase3_search_under_load().await;

    println!("\n[phase 4] same-night contention");
    phase4_contention().await;

    println!("\n=== benchmark complete ===");
}
