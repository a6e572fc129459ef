use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::*;

// ── Helpers ──────────────────────────────────────────────

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("innkeep_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn at(day: &str, hour: u32) -> NaiveDateTime {
    d(day).and_hms_opt(hour, 0, 0).unwrap()
}

fn guest(name: &str, email: &str) -> Guest {
    Guest {
        name: name.into(),
        email: email.into(),
        phone: "+15550100".into(),
        address: None,
        special_requests: None,
    }
}

async fn add_room(engine: &Engine, number: &str, room_type: RoomType, capacity: u32, price: Amount) -> Room {
    engine
        .create_room(NewRoom {
            room_number: number.into(),
            room_type,
            capacity,
            price_per_night: price,
            floor: 1,
            description: String::new(),
            amenities: vec!["wifi".into()],
        })
        .await
        .unwrap()
}

fn stay(target: RoomTarget, check_in: &str, check_out: &str, guests: u32) -> BookingRequest {
    BookingRequest {
        guest: guest("Ada Lovelace", "ada@example.com"),
        target,
        check_in: d(check_in),
        check_out: d(check_out),
        number_of_guests: guests,
        add_ons: Vec::new(),
        idempotency_key: None,
    }
}

async fn room_status(engine: &Engine, id: Ulid) -> RoomStatus {
    engine.get_room(&id).await.unwrap().status
}

fn every_day() -> Vec<DayOfWeek> {
    use DayOfWeek::*;
    vec![Monday, Tuesday, Wednesday, Thursday, Friday, Saturday, Sunday]
}

fn spa(max_capacity: Option<u32>) -> NewService {
    NewService {
        name: "Thermal spa".into(),
        service_type: ServiceType::Spa,
        description: String::new(),
        price: 4_000,
        availability: WeeklyAvailability {
            days: every_day(),
            start_time: NaiveTime::from_hms_opt(8, 0, 0),
            end_time: NaiveTime::from_hms_opt(20, 0, 0),
            max_capacity,
        },
        is_active: true,
        special_offers: Vec::new(),
        requirements: ServiceRequirements::default(),
    }
}

fn spa_slot(start_hour: u32, end_hour: u32, guests: u32) -> ServiceBookingRequest {
    ServiceBookingRequest {
        target: ServiceTarget::Type(ServiceType::Spa),
        start: at("2031-06-10", start_hour),
        end: at("2031-06-10", end_hour),
        guests,
        guest_name: "Ada Lovelace".into(),
        guest_email: "ada@example.com".into(),
        reservation_id: None,
    }
}

// ── Booking ──────────────────────────────────────────────

#[tokio::test]
async fn book_by_room_id_prices_stay_and_reserves_room() {
    let engine = Engine::new(test_wal_path("book_by_id.wal")).unwrap();
    let room = add_room(&engine, "101", RoomType::Double, 2, 20_000).await;

    let r = engine
        .book(stay(RoomTarget::Room(room.id), "2031-03-01", "2031-03-03", 2))
        .await
        .unwrap();
    assert_eq!(r.total_amount, 40_000);
    assert_eq!(r.status, ReservationStatus::Confirmed);
    assert_eq!(r.payment_status, PaymentStatus::Pending);
    assert_eq!(r.room_id, room.id);
    assert_eq!(room_status(&engine, room.id).await, RoomStatus::Reserved);
    assert_eq!(engine.get_reservation(&r.id).await.unwrap(), r);
}

#[tokio::test]
async fn book_rejects_bad_ranges() {
    let engine = Engine::new(test_wal_path("bad_ranges.wal")).unwrap();
    let room = add_room(&engine, "101", RoomType::Single, 1, 10_000).await;

    let reversed = engine
        .book(stay(RoomTarget::Room(room.id), "2031-03-03", "2031-03-01", 1))
        .await;
    assert!(matches!(reversed, Err(EngineError::InvalidRange(_))));

    let empty = engine
        .book(stay(RoomTarget::Room(room.id), "2031-03-03", "2031-03-03", 1))
        .await;
    assert!(matches!(empty, Err(EngineError::InvalidRange(_))));

    let past = engine
        .book(stay(RoomTarget::Room(room.id), "2020-03-01", "2020-03-03", 1))
        .await;
    assert!(matches!(past, Err(EngineError::InvalidRange(_))));
}

#[tokio::test]
async fn book_unknown_room_fails() {
    let engine = Engine::new(test_wal_path("unknown_room.wal")).unwrap();
    let missing = Ulid::new();
    let result = engine
        .book(stay(RoomTarget::Room(missing), "2031-03-01", "2031-03-03", 1))
        .await;
    assert!(matches!(result, Err(EngineError::RoomNotFound(id)) if id == missing));
}

#[tokio::test]
async fn book_over_capacity_or_in_maintenance_is_unavailable() {
    let engine = Engine::new(test_wal_path("capacity_maintenance.wal")).unwrap();
    let room = add_room(&engine, "101", RoomType::Single, 1, 10_000).await;

    let crowd = engine
        .book(stay(RoomTarget::Room(room.id), "2031-03-01", "2031-03-03", 2))
        .await;
    assert!(matches!(crowd, Err(EngineError::RoomUnavailable(_))));

    engine
        .update_room(
            room.id,
            RoomPatch {
                status: Some(RoomStatus::Maintenance),
                ..RoomPatch::default()
            },
        )
        .await
        .unwrap();
    let closed = engine
        .book(stay(RoomTarget::Room(room.id), "2031-03-01", "2031-03-03", 1))
        .await;
    assert!(matches!(closed, Err(EngineError::RoomUnavailable(_))));
}

#[tokio::test]
async fn overlapping_booking_same_room_rejected_touching_allowed() {
    let engine = Engine::new(test_wal_path("overlap_same_room.wal")).unwrap();
    let room = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
    let target = RoomTarget::Room(room.id);

    engine.book(stay(target, "2031-03-01", "2031-03-05", 1)).await.unwrap();
    let overlapping = engine.book(stay(target, "2031-03-04", "2031-03-06", 1)).await;
    assert!(matches!(overlapping, Err(EngineError::RoomUnavailable(_))));

    // Check-out day is the next guest's check-in day.
    engine.book(stay(target, "2031-03-05", "2031-03-07", 1)).await.unwrap();
}

#[tokio::test]
async fn book_by_type_takes_cheapest_then_falls_through() {
    let engine = Engine::new(test_wal_path("book_by_type.wal")).unwrap();
    let pricey = add_room(&engine, "201", RoomType::Double, 2, 30_000).await;
    let cheap = add_room(&engine, "202", RoomType::Double, 2, 15_000).await;
    add_room(&engine, "301", RoomType::Suite, 4, 10_000).await;

    let target = RoomTarget::Type(RoomType::Double);
    let first = engine.book(stay(target, "2031-04-01", "2031-04-03", 2)).await.unwrap();
    let second = engine.book(stay(target, "2031-04-02", "2031-04-04", 2)).await.unwrap();
    assert_eq!(first.room_id, cheap.id);
    assert_eq!(second.room_id, pricey.id);

    let third = engine.book(stay(target, "2031-04-02", "2031-04-03", 1)).await;
    assert!(matches!(third, Err(EngineError::NoRoomAvailable)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_for_one_room_exactly_one_wins() {
    let engine = Arc::new(Engine::new(test_wal_path("concurrent_one_room.wal")).unwrap());
    let room = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;

    for round in 0..10 {
        let day = 1 + round * 3;
        let check_in = format!("2031-05-{day:02}");
        let check_out = format!("2031-05-{:02}", day + 2);
        let a = {
            let engine = engine.clone();
            let req = stay(RoomTarget::Room(room.id), &check_in, &check_out, 1);
            tokio::spawn(async move { engine.book(req).await })
        };
        let b = {
            let engine = engine.clone();
            let req = stay(RoomTarget::Room(room.id), &check_in, &check_out, 1);
            tokio::spawn(async move { engine.book(req).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1, "round {round}");
        let loser = results.iter().find(|r| r.is_err()).unwrap();
        assert!(matches!(loser, Err(EngineError::RoomUnavailable(_))));
    }
}

#[tokio::test]
async fn random_sequences_never_double_book() {
    let engine = Engine::new(test_wal_path("random_sequences.wal")).unwrap();
    let mut rooms = Vec::new();
    for n in 0..3 {
        rooms.push(add_room(&engine, &format!("10{n}"), RoomType::Double, 2, 10_000).await);
    }

    let base = d("2031-01-01");
    let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
    let mut next = move || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed
    };

    let mut accepted: Vec<(usize, Span)> = Vec::new();
    for _ in 0..300 {
        let room = (next() % 3) as usize;
        let start = (next() % 60) as u64;
        let nights = 1 + (next() % 6) as u64;
        let check_in = base + chrono::Days::new(start);
        let check_out = check_in + chrono::Days::new(nights);
        let span = Span::of_stay(check_in, check_out);

        let expected_free = !accepted
            .iter()
            .any(|(r, s)| *r == room && s.overlaps(&span));
        let mut req = stay(RoomTarget::Room(rooms[room].id), "2031-01-01", "2031-01-02", 1);
        req.check_in = check_in;
        req.check_out = check_out;
        let result = engine.book(req).await;
        assert_eq!(result.is_ok(), expected_free, "room {room} {check_in}..{check_out}");
        if result.is_ok() {
            accepted.push((room, span));
        } else {
            assert!(matches!(result, Err(EngineError::RoomUnavailable(_))));
        }
    }

    for room in &rooms {
        let rs = engine.store.get_room(&room.id).unwrap();
        let guard = rs.read().await;
        let active: Vec<_> = guard.reservations.iter().filter(|r| r.is_active()).collect();
        for (i, a) in active.iter().enumerate() {
            for b in &active[i + 1..] {
                assert!(!a.span().overlaps(&b.span()));
            }
        }
    }
}

#[tokio::test]
async fn idempotency_key_returns_first_reservation() {
    let engine = Engine::new(test_wal_path("idempotency.wal")).unwrap();
    let room = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;

    let mut req = stay(RoomTarget::Type(RoomType::Double), "2031-03-01", "2031-03-03", 1);
    req.idempotency_key = Some("msg:SM123".into());
    let first = engine.book(req.clone()).await.unwrap();
    let again = engine.book(req).await.unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(first.room_id, room.id);

    let all = engine.list_reservations(&ReservationFilter::default()).await;
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn idempotency_keys_are_not_kept_for_failed_or_deleted_bookings() {
    let engine = Engine::new(test_wal_path("idempotency_release.wal")).unwrap();
    add_room(&engine, "101", RoomType::Double, 2, 10_000).await;

    for n in 0..5 {
        let mut req = stay(RoomTarget::Type(RoomType::Suite), "2031-03-01", "2031-03-03", 1);
        req.idempotency_key = Some(format!("retry-{n}"));
        assert!(matches!(engine.book(req).await, Err(EngineError::NoRoomAvailable)));
    }
    assert_eq!(engine.store.idempotency_key_count(), 0);

    let mut req = stay(RoomTarget::Type(RoomType::Double), "2031-03-01", "2031-03-03", 1);
    req.idempotency_key = Some("kept".into());
    let r = engine.book(req.clone()).await.unwrap();
    assert_eq!(engine.store.idempotency_key_count(), 1);

    engine.delete_reservation(r.id).await.unwrap();
    assert_eq!(engine.store.idempotency_key_count(), 0);
    let rebooked = engine.book(req).await.unwrap();
    assert_ne!(rebooked.id, r.id);
}

#[tokio::test]
async fn add_ons_are_priced_from_services() {
    let engine = Engine::new(test_wal_path("add_ons.wal")).unwrap();
    let room = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
    let service = engine.create_service(spa(None)).await.unwrap();

    let mut req = stay(RoomTarget::Room(room.id), "2031-03-01", "2031-03-03", 2);
    req.add_ons = vec![AddOnRequest {
        service: service.id,
        quantity: 2,
    }];
    let r = engine.book(req.clone()).await.unwrap();
    assert_eq!(r.total_amount, 2 * 10_000 + 2 * 4_000);
    assert_eq!(r.add_ons.len(), 1);

    req.check_in = d("2031-03-10");
    req.check_out = d("2031-03-11");
    req.add_ons[0].service = Ulid::new();
    let unknown = engine.book(req).await;
    assert!(matches!(unknown, Err(EngineError::ServiceUnavailable(_))));
}

// ── Availability ─────────────────────────────────────────

#[tokio::test]
async fn availability_excludes_small_rooms_and_orders_by_price() {
    let engine = Engine::new(test_wal_path("availability_capacity.wal")).unwrap();
    add_room(&engine, "101", RoomType::Single, 1, 8_000).await;
    add_room(&engine, "102", RoomType::Double, 2, 12_000).await;
    let suite = add_room(&engine, "301", RoomType::Suite, 4, 40_000).await;
    let family = add_room(&engine, "201", RoomType::Double, 3, 18_000).await;

    let rooms = engine
        .find_available_rooms(d("2024-04-01"), d("2024-04-03"), 3, None)
        .await
        .unwrap();
    let ids: Vec<_> = rooms.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![family.id, suite.id]);
    assert!(rooms.iter().all(|r| r.capacity >= 3));

    let suites = engine
        .find_available_rooms(d("2024-04-01"), d("2024-04-03"), 1, Some(RoomType::Suite))
        .await
        .unwrap();
    assert_eq!(suites.len(), 1);
}

#[tokio::test]
async fn availability_rejects_reversed_range() {
    let engine = Engine::new(test_wal_path("availability_range.wal")).unwrap();
    let result = engine
        .find_available_rooms(d("2031-04-03"), d("2031-04-03"), 1, None)
        .await;
    assert!(matches!(result, Err(EngineError::InvalidRange(_))));
}

#[tokio::test]
async fn availability_skips_booked_and_maintenance_rooms() {
    let engine = Engine::new(test_wal_path("availability_booked.wal")).unwrap();
    let booked = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
    let closed = add_room(&engine, "102", RoomType::Double, 2, 10_000).await;
    let free = add_room(&engine, "103", RoomType::Double, 2, 10_000).await;

    engine
        .book(stay(RoomTarget::Room(booked.id), "2031-04-01", "2031-04-05", 1))
        .await
        .unwrap();
    engine
        .update_room(
            closed.id,
            RoomPatch {
                status: Some(RoomStatus::Maintenance),
                ..RoomPatch::default()
            },
        )
        .await
        .unwrap();

    let rooms = engine
        .find_available_rooms(d("2031-04-03"), d("2031-04-04"), 1, None)
        .await
        .unwrap();
    assert_eq!(rooms.iter().map(|r| r.id).collect::<Vec<_>>(), vec![free.id]);

    // The booked room is free again from its check-out day.
    let later = engine
        .find_available_rooms(d("2031-04-05"), d("2031-04-06"), 1, None)
        .await
        .unwrap();
    assert_eq!(later.len(), 2);
}

#[tokio::test]
async fn calendar_lists_free_windows() {
    let engine = Engine::new(test_wal_path("calendar.wal")).unwrap();
    let room = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
    engine
        .book(stay(RoomTarget::Room(room.id), "2031-04-03", "2031-04-05", 1))
        .await
        .unwrap();

    let windows = engine
        .room_calendar(&room.id, d("2031-04-01"), d("2031-04-08"))
        .await
        .unwrap();
    assert_eq!(
        windows,
        vec![
            FreeWindow {
                from: d("2031-04-01"),
                to: d("2031-04-03"),
            },
            FreeWindow {
                from: d("2031-04-05"),
                to: d("2031-04-08"),
            },
        ]
    );
}

// ── Lifecycle ────────────────────────────────────────────

#[tokio::test]
async fn cancel_keeps_room_reserved_while_another_stay_is_active() {
    let engine = Engine::new(test_wal_path("cancel_keeps_reserved.wal")).unwrap();
    let room = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
    let target = RoomTarget::Room(room.id);

    let first = engine.book(stay(target, "2031-03-01", "2031-03-03", 1)).await.unwrap();
    let second = engine.book(stay(target, "2031-03-10", "2031-03-12", 1)).await.unwrap();

    let cancelled = engine.cancel(first.id).await.unwrap();
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    assert_eq!(room_status(&engine, room.id).await, RoomStatus::Reserved);

    engine.cancel(second.id).await.unwrap();
    assert_eq!(room_status(&engine, room.id).await, RoomStatus::Available);
}

#[tokio::test]
async fn cancelled_dates_can_be_rebooked() {
    let engine = Engine::new(test_wal_path("rebook_cancelled.wal")).unwrap();
    let room = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
    let target = RoomTarget::Room(room.id);

    let first = engine.book(stay(target, "2031-03-01", "2031-03-03", 1)).await.unwrap();
    engine.cancel(first.id).await.unwrap();
    engine.book(stay(target, "2031-03-01", "2031-03-03", 1)).await.unwrap();
}

#[tokio::test]
async fn check_in_and_out_drive_room_status_and_verify_review() {
    let engine = Engine::new(test_wal_path("check_in_out.wal")).unwrap();
    let room = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
    let r = engine
        .book(stay(RoomTarget::Room(room.id), "2031-03-01", "2031-03-03", 1))
        .await
        .unwrap();

    let review = engine
        .create_review(NewReview {
            reservation: r.id,
            rating: 5,
            comment: "Lovely stay".into(),
            guest: Reviewer {
                name: "Ada".into(),
                email: "ADA@example.com".into(),
            },
            categories: None,
        })
        .await
        .unwrap();
    assert!(!review.is_verified);

    engine.check_in(r.id).await.unwrap();
    assert_eq!(room_status(&engine, room.id).await, RoomStatus::Occupied);

    let done = engine.check_out(r.id).await.unwrap();
    assert_eq!(done.status, ReservationStatus::CheckedOut);
    assert_eq!(room_status(&engine, room.id).await, RoomStatus::Available);
    assert!(engine.get_review(&review.id).unwrap().is_verified);
}

#[tokio::test]
async fn invalid_transitions_are_refused() {
    let engine = Engine::new(test_wal_path("invalid_transitions.wal")).unwrap();
    let room = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
    let r = engine
        .book(stay(RoomTarget::Room(room.id), "2031-03-01", "2031-03-03", 1))
        .await
        .unwrap();

    let early = engine.check_out(r.id).await;
    assert!(matches!(
        early,
        Err(EngineError::InvalidTransition {
            from: ReservationStatus::Confirmed,
            to: ReservationStatus::CheckedOut
        })
    ));

    engine.cancel(r.id).await.unwrap();
    for result in [engine.check_in(r.id).await, engine.cancel(r.id).await] {
        assert!(matches!(result, Err(EngineError::InvalidTransition { .. })));
    }

    let missing = engine.cancel(Ulid::new()).await;
    assert!(matches!(missing, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn date_change_checks_other_reservations() {
    let engine = Engine::new(test_wal_path("date_change.wal")).unwrap();
    let room = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
    let target = RoomTarget::Room(room.id);
    let first = engine.book(stay(target, "2031-03-01", "2031-03-03", 1)).await.unwrap();
    let second = engine.book(stay(target, "2031-03-05", "2031-03-07", 1)).await.unwrap();

    let clash = engine
        .update_reservation(
            first.id,
            ReservationPatch {
                check_out: Some(d("2031-03-06")),
                ..ReservationPatch::default()
            },
        )
        .await;
    assert!(matches!(clash, Err(EngineError::Conflict(id)) if id == second.id));

    // Shifting within its own range never conflicts with itself.
    let longer = engine
        .update_reservation(
            first.id,
            ReservationPatch {
                check_out: Some(d("2031-03-05")),
                ..ReservationPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(longer.total_amount, 40_000);
    assert_eq!(longer.check_out, d("2031-03-05"));

    let crowd = engine
        .update_reservation(
            first.id,
            ReservationPatch {
                number_of_guests: Some(3),
                ..ReservationPatch::default()
            },
        )
        .await;
    assert!(matches!(crowd, Err(EngineError::RoomUnavailable(_))));
}

#[tokio::test]
async fn room_move_updates_both_rooms() {
    let engine = Engine::new(test_wal_path("room_move.wal")).unwrap();
    let from = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
    let to = add_room(&engine, "301", RoomType::Suite, 4, 25_000).await;
    let r = engine
        .book(stay(RoomTarget::Room(from.id), "2031-03-01", "2031-03-03", 2))
        .await
        .unwrap();

    let moved = engine
        .update_reservation(
            r.id,
            ReservationPatch {
                room_id: Some(to.id),
                ..ReservationPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.room_id, to.id);
    assert_eq!(moved.total_amount, 50_000);
    assert_eq!(room_status(&engine, from.id).await, RoomStatus::Available);
    assert_eq!(room_status(&engine, to.id).await, RoomStatus::Reserved);
    assert_eq!(engine.get_reservation(&r.id).await.unwrap().room_id, to.id);

    // The old room is free for those dates; the new one is not.
    engine
        .book(stay(RoomTarget::Room(from.id), "2031-03-01", "2031-03-03", 1))
        .await
        .unwrap();
    let taken = engine
        .book(stay(RoomTarget::Room(to.id), "2031-03-02", "2031-03-03", 1))
        .await;
    assert!(matches!(taken, Err(EngineError::RoomUnavailable(_))));
}

#[tokio::test]
async fn update_applies_status_and_payment() {
    let engine = Engine::new(test_wal_path("update_status_payment.wal")).unwrap();
    let room = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
    let r = engine
        .book(stay(RoomTarget::Room(room.id), "2031-03-01", "2031-03-03", 1))
        .await
        .unwrap();

    let updated = engine
        .update_reservation(
            r.id,
            ReservationPatch {
                status: Some(ReservationStatus::CheckedIn),
                payment_status: Some(PaymentStatus::Paid),
                ..ReservationPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, ReservationStatus::CheckedIn);
    assert_eq!(updated.payment_status, PaymentStatus::Paid);
    assert_eq!(room_status(&engine, room.id).await, RoomStatus::Occupied);
}

#[tokio::test]
async fn delete_reservation_releases_room_unless_reviewed() {
    let engine = Engine::new(test_wal_path("delete_reservation.wal")).unwrap();
    let room = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
    let target = RoomTarget::Room(room.id);

    let plain = engine.book(stay(target, "2031-03-01", "2031-03-03", 1)).await.unwrap();
    engine.delete_reservation(plain.id).await.unwrap();
    assert_eq!(room_status(&engine, room.id).await, RoomStatus::Available);
    assert!(matches!(
        engine.get_reservation(&plain.id).await,
        Err(EngineError::NotFound(_))
    ));

    let reviewed = engine.book(stay(target, "2031-03-05", "2031-03-07", 1)).await.unwrap();
    engine
        .create_review(NewReview {
            reservation: reviewed.id,
            rating: 4,
            comment: "Good".into(),
            guest: Reviewer {
                name: "Ada".into(),
                email: "ada@example.com".into(),
            },
            categories: None,
        })
        .await
        .unwrap();
    let refused = engine.delete_reservation(reviewed.id).await;
    assert!(matches!(refused, Err(EngineError::ReferencedByReview(_))));
}

#[tokio::test]
async fn reconcile_fixes_stale_statuses() {
    let engine = Engine::new(test_wal_path("reconcile.wal")).unwrap();
    let room = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
    engine
        .book(stay(RoomTarget::Room(room.id), "2031-03-01", "2031-03-03", 1))
        .await
        .unwrap();
    assert_eq!(engine.reconcile_room_statuses(now_ms()).await.unwrap(), 0);

    // Once the stay is in the past the room is free again.
    let later = date_ms(d("2031-04-01"));
    assert_eq!(engine.reconcile_room_statuses(later).await.unwrap(), 1);
    assert_eq!(room_status(&engine, room.id).await, RoomStatus::Available);
    assert_eq!(engine.reconcile_room_statuses(later).await.unwrap(), 0);
}

// ── Rooms ────────────────────────────────────────────────

#[tokio::test]
async fn room_numbers_are_unique() {
    let engine = Engine::new(test_wal_path("room_numbers.wal")).unwrap();
    add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
    let other = add_room(&engine, "102", RoomType::Double, 2, 10_000).await;

    let dup = engine
        .create_room(NewRoom {
            room_number: "101".into(),
            room_type: RoomType::Single,
            capacity: 1,
            price_per_night: 5_000,
            floor: 1,
            description: String::new(),
            amenities: Vec::new(),
        })
        .await;
    assert!(matches!(dup, Err(EngineError::AlreadyExists(_))));

    let renumber = engine
        .update_room(
            other.id,
            RoomPatch {
                room_number: Some("101".into()),
                ..RoomPatch::default()
            },
        )
        .await;
    assert!(matches!(renumber, Err(EngineError::AlreadyExists(_))));
}

#[tokio::test]
async fn room_status_patch_accepts_only_administrative_values() {
    let engine = Engine::new(test_wal_path("room_status_patch.wal")).unwrap();
    let room = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
    engine
        .book(stay(RoomTarget::Room(room.id), "2031-03-01", "2031-03-03", 1))
        .await
        .unwrap();

    let bogus = engine
        .update_room(
            room.id,
            RoomPatch {
                status: Some(RoomStatus::Occupied),
                ..RoomPatch::default()
            },
        )
        .await;
    assert!(matches!(bogus, Err(EngineError::Invalid(_))));

    let patch = |status| RoomPatch {
        status: Some(status),
        ..RoomPatch::default()
    };
    engine.update_room(room.id, patch(RoomStatus::Maintenance)).await.unwrap();
    assert_eq!(room_status(&engine, room.id).await, RoomStatus::Maintenance);
    // Back in service, the future reservation makes it reserved again.
    engine.update_room(room.id, patch(RoomStatus::Available)).await.unwrap();
    assert_eq!(room_status(&engine, room.id).await, RoomStatus::Reserved);
}

#[tokio::test]
async fn delete_room_refused_while_reserved() {
    let engine = Engine::new(test_wal_path("delete_room.wal")).unwrap();
    let room = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
    let r = engine
        .book(stay(RoomTarget::Room(room.id), "2031-03-01", "2031-03-03", 1))
        .await
        .unwrap();

    assert!(matches!(engine.delete_room(room.id).await, Err(EngineError::InUse(_))));
    engine.cancel(r.id).await.unwrap();
    engine.delete_room(room.id).await.unwrap();
    assert!(matches!(engine.get_room(&room.id).await, Err(EngineError::RoomNotFound(_))));

    // The number is free for reuse.
    add_room(&engine, "101", RoomType::Single, 1, 5_000).await;
}

#[tokio::test]
async fn list_rooms_filters() {
    let engine = Engine::new(test_wal_path("list_rooms.wal")).unwrap();
    add_room(&engine, "101", RoomType::Single, 1, 8_000).await;
    add_room(&engine, "102", RoomType::Double, 2, 12_000).await;
    add_room(&engine, "301", RoomType::Suite, 4, 40_000).await;

    let doubles = engine
        .list_rooms(&RoomFilter {
            room_type: Some(RoomType::Double),
            ..RoomFilter::default()
        })
        .await;
    assert_eq!(doubles.len(), 1);

    let mid = engine
        .list_rooms(&RoomFilter {
            min_price: Some(10_000),
            max_price: Some(50_000),
            ..RoomFilter::default()
        })
        .await;
    let numbers: Vec<_> = mid.iter().map(|r| r.room_number.as_str()).collect();
    assert_eq!(numbers, vec!["102", "301"]);
}

// ── Services ─────────────────────────────────────────────

#[tokio::test]
async fn service_capacity_is_shared_across_overlapping_slots() {
    let engine = Engine::new(test_wal_path("service_capacity.wal")).unwrap();
    engine.create_service(spa(Some(4))).await.unwrap();

    engine.book_service(spa_slot(10, 12, 3)).await.unwrap();
    let full = engine.book_service(spa_slot(11, 13, 2)).await;
    assert!(matches!(full, Err(EngineError::ServiceUnavailable(_))));
    engine.book_service(spa_slot(11, 13, 1)).await.unwrap();
    // Back-to-back slots do not share guests.
    engine.book_service(spa_slot(13, 14, 4)).await.unwrap();

    let bookings = engine.list_service_bookings(None).await.unwrap();
    assert_eq!(bookings.len(), 3);
    assert_eq!(bookings[0].total_price, 3 * 4_000);
}

#[tokio::test]
async fn service_hours_and_requirements_are_honoured() {
    let engine = Engine::new(test_wal_path("service_requirements.wal")).unwrap();
    let mut new = spa(None);
    new.requirements = ServiceRequirements {
        advance_booking: 0,
        minimum_guests: 2,
        maximum_guests: Some(3),
    };
    engine.create_service(new).await.unwrap();

    for (start, end, guests) in [(6, 9, 2), (19, 21, 2), (10, 11, 1), (10, 11, 4)] {
        let result = engine.book_service(spa_slot(start, end, guests)).await;
        assert!(
            matches!(result, Err(EngineError::ServiceUnavailable(_))),
            "{start}-{end} x{guests}"
        );
    }
    engine.book_service(spa_slot(10, 11, 2)).await.unwrap();

    let found = engine
        .find_available_service(ServiceType::Spa, at("2031-06-10", 10), at("2031-06-10", 11), 2)
        .await
        .unwrap();
    assert_eq!(found.name, "Thermal spa");
    let none = engine
        .find_available_service(ServiceType::Gym, at("2031-06-10", 10), at("2031-06-10", 11), 2)
        .await;
    assert!(matches!(none, Err(EngineError::ServiceUnavailable(_))));
}

#[tokio::test]
async fn service_booking_cancel_frees_capacity() {
    let engine = Engine::new(test_wal_path("service_cancel.wal")).unwrap();
    engine.create_service(spa(Some(2))).await.unwrap();
    let b = engine.book_service(spa_slot(10, 11, 2)).await.unwrap();
    assert!(engine.book_service(spa_slot(10, 11, 1)).await.is_err());

    engine.cancel_service_booking(b.id).await.unwrap();
    engine.book_service(spa_slot(10, 11, 1)).await.unwrap();
    assert!(matches!(
        engine.cancel_service_booking(b.id).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn delete_service_refused_with_upcoming_bookings() {
    let engine = Engine::new(test_wal_path("delete_service.wal")).unwrap();
    let service = engine.create_service(spa(None)).await.unwrap();
    let b = engine.book_service(spa_slot(10, 11, 1)).await.unwrap();

    assert!(matches!(engine.delete_service(service.id).await, Err(EngineError::InUse(_))));
    engine.cancel_service_booking(b.id).await.unwrap();
    engine.delete_service(service.id).await.unwrap();
    assert!(matches!(engine.get_service(&service.id).await, Err(EngineError::NotFound(_))));
}

// ── Reviews ──────────────────────────────────────────────

#[tokio::test]
async fn reviews_require_matching_email_once_per_reservation() {
    let engine = Engine::new(test_wal_path("reviews.wal")).unwrap();
    let room = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
    let r = engine
        .book(stay(RoomTarget::Room(room.id), "2031-03-01", "2031-03-03", 1))
        .await
        .unwrap();
    let review = |reservation, email: &str| NewReview {
        reservation,
        rating: 4,
        comment: "Quiet and clean".into(),
        guest: Reviewer {
            name: "Ada".into(),
            email: email.into(),
        },
        categories: Some(CategoryRatings {
            cleanliness: Some(5),
            ..CategoryRatings::default()
        }),
    };

    let stranger = engine.create_review(review(r.id, "eve@example.com")).await;
    assert!(matches!(stranger, Err(EngineError::Forbidden(_))));

    let missing = engine.create_review(review(Ulid::new(), "ada@example.com")).await;
    assert!(matches!(missing, Err(EngineError::NotFound(_))));

    let created = engine.create_review(review(r.id, "ada@example.com")).await.unwrap();
    let dup = engine.create_review(review(r.id, "ada@example.com")).await;
    assert!(matches!(dup, Err(EngineError::DuplicateReview(_))));

    let mut bad = review(r.id, "ada@example.com");
    bad.rating = 6;
    assert!(matches!(engine.create_review(bad).await, Err(EngineError::Invalid(_))));

    let answered = engine
        .update_review(
            created.id,
            ReviewPatch {
                response: Some(ResponseInput {
                    comment: "Thank you!".into(),
                    responded_by: "Front desk".into(),
                }),
                ..ReviewPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(answered.response.unwrap().responded_by, "Front desk");

    engine.delete_review(created.id).await.unwrap();
    assert!(engine.list_reviews(&ReviewFilter::default()).is_empty());
    // A deleted review frees the reservation for a new one.
    engine.create_review(review(r.id, "ada@example.com")).await.unwrap();
}

// ── Snapshot ─────────────────────────────────────────────

#[tokio::test]
async fn hotel_snapshot_summarises_types_and_services() {
    let engine = Engine::new(test_wal_path("snapshot.wal")).unwrap();
    add_room(&engine, "101", RoomType::Double, 2, 12_000).await;
    add_room(&engine, "102", RoomType::Double, 3, 10_000).await;
    let closed = add_room(&engine, "301", RoomType::Suite, 4, 40_000).await;
    engine
        .update_room(
            closed.id,
            RoomPatch {
                status: Some(RoomStatus::Maintenance),
                ..RoomPatch::default()
            },
        )
        .await
        .unwrap();
    let mut inactive = spa(None);
    inactive.is_active = false;
    inactive.name = "Closed spa".into();
    engine.create_service(inactive).await.unwrap();
    engine.create_service(spa(None)).await.unwrap();

    let snapshot = engine.hotel_snapshot(d("2031-02-01")).await;
    assert_eq!(snapshot.rooms.len(), 1);
    let doubles = &snapshot.rooms[0];
    assert_eq!(doubles.room_type, RoomType::Double);
    assert_eq!(doubles.price_from, 10_000);
    assert_eq!(doubles.max_capacity, 3);
    assert_eq!(doubles.available_tonight, 2);
    assert_eq!(snapshot.services.len(), 1);
    assert_eq!(snapshot.services[0].name, "Thermal spa");
}

// ── Persistence ──────────────────────────────────────────

#[tokio::test]
async fn wal_replay_restores_state() {
    let path = test_wal_path("replay.wal");
    let (room_id, kept, cancelled, review_id, booking_id);
    {
        let engine = Engine::new(path.clone()).unwrap();
        let room = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
        room_id = room.id;
        let mut req = stay(RoomTarget::Room(room.id), "2031-03-01", "2031-03-03", 1);
        req.idempotency_key = Some("replay-key".into());
        kept = engine.book(req).await.unwrap();
        cancelled = engine
            .book(stay(RoomTarget::Room(room.id), "2031-03-05", "2031-03-06", 1))
            .await
            .unwrap();
        engine.cancel(cancelled.id).await.unwrap();
        review_id = engine
            .create_review(NewReview {
                reservation: kept.id,
                rating: 5,
                comment: "Great".into(),
                guest: Reviewer {
                    name: "Ada".into(),
                    email: "ada@example.com".into(),
                },
                categories: None,
            })
            .await
            .unwrap()
            .id;
        engine.create_service(spa(Some(4))).await.unwrap();
        booking_id = engine.book_service(spa_slot(10, 11, 2)).await.unwrap().id;
    }

    let engine = Engine::new(path).unwrap();
    assert_eq!(room_status(&engine, room_id).await, RoomStatus::Reserved);
    assert_eq!(engine.get_reservation(&kept.id).await.unwrap(), kept);
    assert_eq!(
        engine.get_reservation(&cancelled.id).await.unwrap().status,
        ReservationStatus::Cancelled
    );
    assert_eq!(engine.get_review(&review_id).unwrap().reservation_id, kept.id);
    assert_eq!(engine.list_service_bookings(None).await.unwrap()[0].id, booking_id);

    // Replayed state still enforces the rules.
    let clash = engine
        .book(stay(RoomTarget::Room(room_id), "2031-03-02", "2031-03-04", 1))
        .await;
    assert!(matches!(clash, Err(EngineError::RoomUnavailable(_))));
    let dup_number = engine
        .create_room(NewRoom {
            room_number: "101".into(),
            room_type: RoomType::Single,
            capacity: 1,
            price_per_night: 1,
            floor: 0,
            description: String::new(),
            amenities: Vec::new(),
        })
        .await;
    assert!(matches!(dup_number, Err(EngineError::AlreadyExists(_))));
    let mut again = stay(RoomTarget::Room(room_id), "2031-03-01", "2031-03-03", 1);
    again.idempotency_key = Some("replay-key".into());
    assert_eq!(engine.book(again).await.unwrap().id, kept.id);
}

#[tokio::test]
async fn wal_replay_restores_moves() {
    let path = test_wal_path("replay_move.wal");
    let (from, to, r);
    {
        let engine = Engine::new(path.clone()).unwrap();
        from = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
        to = add_room(&engine, "102", RoomType::Double, 2, 10_000).await;
        r = engine
            .book(stay(RoomTarget::Room(from.id), "2031-03-01", "2031-03-03", 1))
            .await
            .unwrap();
        engine
            .update_reservation(
                r.id,
                ReservationPatch {
                    room_id: Some(to.id),
                    ..ReservationPatch::default()
                },
            )
            .await
            .unwrap();
    }

    let engine = Engine::new(path).unwrap();
    assert_eq!(engine.get_reservation(&r.id).await.unwrap().room_id, to.id);
    assert_eq!(room_status(&engine, from.id).await, RoomStatus::Available);
    assert_eq!(room_status(&engine, to.id).await, RoomStatus::Reserved);
}

#[tokio::test]
async fn bookings_after_a_torn_tail_survive_restart() {
    use std::io::Write;

    let path = test_wal_path("torn_restart.wal");
    let (room, first);
    {
        let engine = Engine::new(path.clone()).unwrap();
        room = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
        first = engine
            .book(stay(RoomTarget::Room(room.id), "2031-03-01", "2031-03-03", 1))
            .await
            .unwrap();
    }
    {
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(&[0xAB; 6]).unwrap();
        f.sync_all().unwrap();
    }

    let second = {
        let engine = Engine::new(path.clone()).unwrap();
        assert_eq!(engine.get_reservation(&first.id).await.unwrap(), first);
        engine
            .book(stay(RoomTarget::Room(room.id), "2031-04-01", "2031-04-03", 1))
            .await
            .unwrap()
    };

    let engine = Engine::new(path).unwrap();
    assert_eq!(engine.get_reservation(&second.id).await.unwrap(), second);
    assert_eq!(engine.list_reservations(&ReservationFilter::default()).await.len(), 2);
    let again = engine
        .book(stay(RoomTarget::Room(room.id), "2031-04-01", "2031-04-03", 1))
        .await;
    assert!(matches!(again, Err(EngineError::RoomUnavailable(_))));
}

#[tokio::test]
async fn compaction_preserves_state() {
    let path = test_wal_path("compaction.wal");
    let (room_id, live);
    {
        let engine = Engine::new(path.clone()).unwrap();
        let room = add_room(&engine, "101", RoomType::Double, 2, 10_000).await;
        room_id = room.id;
        for day in 1..=9 {
            let r = engine
                .book(stay(
                    RoomTarget::Room(room.id),
                    &format!("2031-07-{day:02}"),
                    &format!("2031-07-{:02}", day + 1),
                    1,
                ))
                .await
                .unwrap();
            engine.cancel(r.id).await.unwrap();
        }
        live = engine
            .book(stay(RoomTarget::Room(room.id), "2031-08-01", "2031-08-04", 2))
            .await
            .unwrap();
        assert!(engine.wal_appends_since_compact().await >= 20);

        let before = std::fs::metadata(&path).unwrap().len();
        engine.compact_wal().await.unwrap();
        assert_eq!(engine.wal_appends_since_compact().await, 0);
        assert!(std::fs::metadata(&path).unwrap().len() < before);

        engine.check_in(live.id).await.unwrap();
    }

    let engine = Engine::new(path).unwrap();
    let all = engine.list_reservations(&ReservationFilter::default()).await;
    assert_eq!(all.len(), 10);
    let restored = engine.get_reservation(&live.id).await.unwrap();
    assert_eq!(restored.status, ReservationStatus::CheckedIn);
    assert_eq!(room_status(&engine, room_id).await, RoomStatus::Occupied);
}
