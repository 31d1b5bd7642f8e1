//! End-to-end run of one rotation week: bookings through the engine, the
//! three daily jobs through the scheduler, notices through the hub.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use deskrota::calendar::DayKey;
use deskrota::engine::{Engine, EngineError, RejectReason};
use deskrota::model::{Batch, BookingStatus, Role, SeatType};
use deskrota::notify::{Notice, NotifyHub};
use deskrota::scheduler::{self, JobMarkers};

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("deskrota_test_lifecycle");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn ts(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn day(s: &str) -> DayKey {
    s.parse().unwrap()
}

#[tokio::test]
async fn one_week_of_rotation() {
    let path = test_wal_path("one_week.wal");
    let engine = Arc::new(Engine::open(&path, Arc::new(NotifyHub::new()), 10_000).unwrap());

    // Two batch-1 employees, one batch-2 employee, one admin.
    let ana = engine
        .add_employee("Ana".into(), "E1".into(), Batch::One, 1, Role::Employee)
        .await
        .unwrap();
    let bo = engine
        .add_employee("Bo".into(), "E2".into(), Batch::One, 2, Role::Employee)
        .await
        .unwrap();
    let cy = engine
        .add_employee("Cy".into(), "E3".into(), Batch::Two, 3, Role::Employee)
        .await
        .unwrap();
    engine
        .add_employee("Ada".into(), "E4".into(), Batch::Two, 4, Role::Admin)
        .await
        .unwrap();

    let desk = engine
        .add_seat("A-01".into(), SeatType::Designated, true)
        .await
        .unwrap();
    let float_seat = engine
        .add_seat("F-01".into(), SeatType::Floating, true)
        .await
        .unwrap();

    let mut rx_ana = engine.notify.subscribe(ana.id);
    let mut rx_bo = engine.notify.subscribe(bo.id);
    let mut rx_cy = engine.notify.subscribe(cy.id);

    let monday = day("2025-06-09");
    let mut markers = JobMarkers::default();

    // ── Sunday, 14:00 — Cy tries to jump the floating gate.
    let err = engine
        .book_seat(cy.id, float_seat.id, ts("2025-06-09T00:00:00Z"), ts("2025-06-08T14:00:00Z"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Rejected(RejectReason::NotYetOpen)
    ));

    // ── Sunday, 14:30 — reminder job: Ana and Bo are on-site tomorrow and
    // unbooked, Cy is remote.
    scheduler::tick(&engine, ts("2025-06-08T14:30:00Z"), &mut markers).await;
    let reminder = Notice::Reminder {
        day: monday,
        batch: Batch::One,
    };
    assert_eq!(rx_ana.try_recv().unwrap(), reminder);
    assert_eq!(rx_bo.try_recv().unwrap(), reminder);
    assert!(rx_cy.try_recv().is_err());

    // ── Sunday, 15:00 — gate opens; Cy books the floating seat, Ana her desk.
    scheduler::tick(&engine, ts("2025-06-08T15:00:00Z"), &mut markers).await;
    assert_eq!(
        rx_cy.try_recv().unwrap(),
        Notice::FloatingUnlocked { day: monday }
    );

    let cy_booking = engine
        .book_seat(cy.id, float_seat.id, ts("2025-06-09T00:00:00Z"), ts("2025-06-08T15:05:00Z"))
        .await
        .unwrap();
    assert_eq!(cy_booking.booking_type, SeatType::Floating);
    let ana_booking = engine
        .book_seat(ana.id, desk.id, ts("2025-06-09T00:00:00Z"), ts("2025-06-08T15:06:00Z"))
        .await
        .unwrap();

    // ── Monday morning — Bo wants Ana's desk; it is taken until she releases.
    let err = engine
        .book_seat(bo.id, desk.id, ts("2025-06-09T00:00:00Z"), ts("2025-06-09T08:00:00Z"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Rejected(RejectReason::SeatTaken)
    ));

    engine
        .release_booking(ana_booking.id, ana.id, ts("2025-06-09T08:30:00Z"))
        .await
        .unwrap();
    let bo_booking = engine
        .book_seat(bo.id, desk.id, ts("2025-06-09T00:00:00Z"), ts("2025-06-09T08:31:00Z"))
        .await
        .unwrap();

    let avail = engine.availability(monday).await;
    assert_eq!(avail.designated.booked, 1);
    assert_eq!(avail.floating.booked, 1);

    // ── Tuesday midnight — finalization completes Monday's bookings.
    markers = JobMarkers::default();
    scheduler::tick(&engine, ts("2025-06-10T00:00:01Z"), &mut markers).await;
    assert_eq!(
        engine.get_booking(cy_booking.id).unwrap().status,
        BookingStatus::Completed
    );
    assert_eq!(
        engine.get_booking(bo_booking.id).unwrap().status,
        BookingStatus::Completed
    );
    assert_eq!(
        engine.get_booking(ana_booking.id).unwrap().status,
        BookingStatus::Released
    );

    // ── Thursday — batches swap: Cy books a designated seat, Ana must wait
    // for the floating gate.
    let thursday = ts("2025-06-12T00:00:00Z");
    engine
        .book_seat(cy.id, desk.id, thursday, ts("2025-06-11T09:00:00Z"))
        .await
        .unwrap();
    let err = engine
        .book_seat(ana.id, desk.id, thursday, ts("2025-06-11T09:00:00Z"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Rejected(RejectReason::UseFloatingSeat)
    ));
    let ana_float = engine
        .book_seat(ana.id, float_seat.id, thursday, ts("2025-06-11T16:00:00Z"))
        .await
        .unwrap();
    assert_eq!(ana_float.booking_type, SeatType::Floating);

    // ── The whole week survives a restart.
    drop(engine);
    let engine = Engine::open(&path, Arc::new(NotifyHub::new()), 10_000).unwrap();
    assert_eq!(
        engine.get_booking(ana_float.id).unwrap().status,
        BookingStatus::Confirmed
    );
    assert_eq!(
        engine.get_booking(bo_booking.id).unwrap().status,
        BookingStatus::Completed
    );
    let history = engine.bookings_for_employee(ana.id);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].day, day("2025-06-12"));
}

#[tokio::test]
async fn weekend_has_no_designated_bookings() {
    let path = test_wal_path("weekend.wal");
    let engine = Engine::open(&path, Arc::new(NotifyHub::new()), 10_000).unwrap();
    let emp = engine
        .add_employee("Ana".into(), "E1".into(), Batch::One, 1, Role::Employee)
        .await
        .unwrap();
    let desk = engine
        .add_seat("A-01".into(), SeatType::Designated, true)
        .await
        .unwrap();

    // Saturday is nobody's batch day.
    let err = engine
        .book_seat(emp.id, desk.id, ts("2025-06-14T00:00:00Z"), ts("2025-06-13T10:00:00Z"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Rejected(RejectReason::UseFloatingSeat)
    ));
}
