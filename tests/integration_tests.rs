use std::sync::{Arc, Barrier};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use slotbook::clock::FixedClock;
use slotbook::db::SqliteStore;
use slotbook::models::{
    CalendarRule, CalendarRuleType, Reservation, ReservationSource, ReservationStatus, Service,
    TimeWindow, WorkingHour,
};
use slotbook::repository::{ListOverlappingQuery, Repositories, ReservationRepository};
use slotbook::{AvailabilityResult, BookingRequest, ErrorKind, Scheduler, SchedulingError};

// ── Helpers ──

const SERVICE: &str = "svc-cut";

// 2025-06-16 is a Monday, 2025-06-17 a Tuesday
fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 16).unwrap()
}

fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 17).unwrap()
}

fn tue(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 17, h, m, 0).unwrap()
}

fn window(start: DateTime<Utc>, end: DateTime<Utc>) -> TimeWindow {
    TimeWindow::new(start, end).unwrap()
}

struct Harness {
    store: Arc<SqliteStore>,
    clock: Arc<FixedClock>,
    scheduler: Scheduler,
}

fn harness_in(zone: Tz) -> Harness {
    let store = Arc::new(SqliteStore::open(":memory:").unwrap());
    // Monday morning, before every booking below
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 6, 16, 6, 0, 0).unwrap(),
    ));
    let scheduler = Scheduler::new(Repositories::from_store(store.clone()), clock.clone(), zone)
        .with_slot_step(30);

    store
        .insert_service(&Service {
            id: SERVICE.to_string(),
            title: "Haircut".to_string(),
            duration_minutes: 30,
            price_cents: Some(3000),
            is_active: true,
            deleted_at: None,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        })
        .unwrap();

    Harness {
        store,
        clock,
        scheduler,
    }
}

fn harness() -> Harness {
    harness_in(chrono_tz::UTC)
}

impl Harness {
    fn working_hour(&self, id: &str, weekday: u8, start: &str, end: &str) {
        self.store
            .insert_working_hour(&WorkingHour {
                id: id.to_string(),
                service_id: SERVICE.to_string(),
                weekday,
                start_time: start.to_string(),
                end_time: end.to_string(),
                is_active: true,
            })
            .unwrap();
    }

    fn calendar_rule(
        &self,
        id: &str,
        rule_type: CalendarRuleType,
        date: NaiveDate,
        times: Option<(&str, &str)>,
    ) {
        self.store
            .insert_calendar_rule(&CalendarRule {
                id: id.to_string(),
                service_id: SERVICE.to_string(),
                rule_type,
                start_date: date,
                end_date: None,
                start_time: times.map(|(s, _)| s.to_string()),
                end_time: times.map(|(_, e)| e.to_string()),
                is_active: true,
            })
            .unwrap();
    }

    fn book(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Reservation, SchedulingError> {
        self.scheduler
            .book(&BookingRequest::online("user-1", SERVICE, start).ending_at(end))
    }

    /// Tuesday 09:00-12:00
    fn tuesday_morning(&self) {
        self.working_hour("tue-am", 2, "09:00", "12:00");
    }
}

// ── End-to-end ──

#[test]
fn test_end_to_end_booking_day() {
    let h = harness();
    h.tuesday_morning();

    // Length defaults to the 30 minute service duration
    let first = h
        .scheduler
        .book(&BookingRequest::online("user-1", SERVICE, tue(9, 0)))
        .unwrap();
    assert_eq!(first.status, ReservationStatus::Pending);
    assert_eq!(first.window(), window(tue(9, 0), tue(9, 30)));

    let err = h.book(tue(9, 15), tue(9, 45)).unwrap_err();
    match err {
        SchedulingError::SlotConflict {
            reservation_id,
            window: conflict,
        } => {
            assert_eq!(reservation_id, first.id);
            assert_eq!(conflict, window(tue(9, 0), tue(9, 30)));
        }
        other => panic!("expected slot conflict, got {other:?}"),
    }

    // Touching the previous booking is not an overlap
    let second = h.book(tue(9, 30), tue(10, 0)).unwrap();
    assert_eq!(second.status, ReservationStatus::Pending);

    let stored = h.scheduler.reservation(&second.id).unwrap();
    assert_eq!(stored.window(), window(tue(9, 30), tue(10, 0)));
    assert_eq!(stored.source, ReservationSource::Online);
}

#[test]
fn test_concurrent_bookings_admit_exactly_one() {
    const BOOKERS: usize = 8;

    let h = harness();
    h.tuesday_morning();
    let barrier = Barrier::new(BOOKERS);

    let results: Vec<Result<_, SchedulingError>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..BOOKERS)
            .map(|i| {
                let scheduler = &h.scheduler;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    let user = format!("user-{i}");
                    scheduler.book(
                        &BookingRequest::online(&user, SERVICE, tue(10, 0)).ending_at(tue(11, 0)),
                    )
                })
            })
            .collect();
        handles.into_iter().map(|t| t.join().unwrap()).collect()
    });

    let admitted = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.kind() == ErrorKind::SlotConflict))
        .count();
    assert_eq!(admitted, 1);
    assert_eq!(conflicts, BOOKERS - 1);
}

#[test]
fn test_schedulers_sharing_a_database_file_never_double_book() {
    const ATTEMPTS: usize = 50;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slotbook.db");
    let path = path.to_str().unwrap();

    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 6, 16, 6, 0, 0).unwrap(),
    ));
    // Two independent stores and schedulers, as two worker processes would have
    let store_a = Arc::new(SqliteStore::open(path).unwrap());
    let store_b = Arc::new(SqliteStore::open(path).unwrap());
    let scheduler_a = Scheduler::new(
        Repositories::from_store(store_a.clone()),
        clock.clone(),
        chrono_tz::UTC,
    );
    let scheduler_b = Scheduler::new(Repositories::from_store(store_b), clock, chrono_tz::UTC);

    store_a
        .insert_service(&Service {
            id: SERVICE.to_string(),
            title: "Haircut".to_string(),
            duration_minutes: 30,
            price_cents: None,
            is_active: true,
            deleted_at: None,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        })
        .unwrap();
    store_a
        .insert_working_hour(&WorkingHour {
            id: "tue-am".to_string(),
            service_id: SERVICE.to_string(),
            weekday: 2,
            start_time: "09:00".to_string(),
            end_time: "12:00".to_string(),
            is_active: true,
        })
        .unwrap();

    // Six 30 minute slots between 09:00 and 12:00
    let book_all = |scheduler: &Scheduler| -> Vec<Result<Reservation, SchedulingError>> {
        (0..ATTEMPTS)
            .map(|i| {
                let start = tue(9, 0) + Duration::minutes(30 * (i % 6) as i64);
                scheduler.book(&BookingRequest::online("user-1", SERVICE, start))
            })
            .collect()
    };

    let (results_a, results_b) = std::thread::scope(|s| {
        let a = s.spawn(|| book_all(&scheduler_a));
        let b = s.spawn(|| book_all(&scheduler_b));
        (a.join().unwrap(), b.join().unwrap())
    });

    let results: Vec<_> = results_a.into_iter().chain(results_b).collect();
    for result in &results {
        if let Err(e) = result {
            assert_eq!(e.kind(), ErrorKind::SlotConflict, "{e}");
        }
    }
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 6);

    let morning = window(tue(9, 0), tue(12, 0));
    let stored = store_a
        .list_overlapping(&ListOverlappingQuery::active(SERVICE, morning))
        .unwrap();
    assert_eq!(stored.len(), 6);
    for pair in stored.windows(2) {
        assert!(!pair[0].window().overlaps(&pair[1].window()));
    }
}

#[test]
fn test_check_request_matches_booking_for_walk_ins() {
    let h = harness();
    h.tuesday_morning();
    h.clock.set(tue(9, 10));

    let walk_in = BookingRequest::online("user-1", SERVICE, tue(9, 0))
        .by_staff(ReservationSource::WalkIn, "staff-1");
    assert_eq!(
        h.scheduler.check_request(&walk_in).unwrap(),
        AvailabilityResult::Available {
            window: window(tue(9, 0), tue(9, 30))
        }
    );

    // The online form of the same range is still refused
    let online = BookingRequest::online("user-1", SERVICE, tue(9, 0));
    assert_eq!(
        h.scheduler.check_request(&online).unwrap_err().kind(),
        ErrorKind::StartsInPast
    );
    assert_eq!(
        h.scheduler
            .check_availability(SERVICE, tue(9, 0), tue(9, 30))
            .unwrap_err()
            .kind(),
        ErrorKind::StartsInPast
    );

    let booked = h.scheduler.book(&walk_in).unwrap();
    assert_eq!(booked.status, ReservationStatus::Confirmed);

    // Once admitted, the same check reports the conflict
    match h.scheduler.check_request(&walk_in).unwrap() {
        AvailabilityResult::SlotConflict { reservation_id, .. } => {
            assert_eq!(reservation_id, booked.id)
        }
        other => panic!("expected slot conflict, got {other:?}"),
    }
}

#[test]
fn test_check_availability_is_idempotent() {
    let h = harness();
    h.tuesday_morning();
    h.book(tue(9, 0), tue(9, 30)).unwrap();

    let first = h
        .scheduler
        .check_availability(SERVICE, tue(9, 0), tue(10, 0))
        .unwrap();
    let second = h
        .scheduler
        .check_availability(SERVICE, tue(9, 0), tue(10, 0))
        .unwrap();
    assert_eq!(first, second);
    assert!(!first.is_available());

    let free = h
        .scheduler
        .check_availability(SERVICE, tue(10, 0), tue(10, 30))
        .unwrap();
    assert_eq!(
        free,
        AvailabilityResult::Available {
            window: window(tue(10, 0), tue(10, 30))
        }
    );
}

// ── Schedule resolution ──

#[test]
fn test_day_off_blocks_the_weekly_template() {
    let h = harness();
    h.working_hour("mon", 1, "09:00", "17:00");
    h.calendar_rule("closed", CalendarRuleType::DayOff, monday(), None);

    let windows = h.scheduler.list_bookable_windows(SERVICE, monday()).unwrap();
    assert!(windows.is_empty());

    // The following Monday still uses the template
    let next = monday() + Duration::days(7);
    assert_eq!(h.scheduler.list_bookable_windows(SERVICE, next).unwrap().len(), 1);
}

#[test]
fn test_custom_day_overrides_template() {
    let h = harness();
    h.working_hour("mon", 1, "09:00", "17:00");
    h.calendar_rule(
        "short",
        CalendarRuleType::CustomDay,
        monday(),
        Some(("10:00", "14:00")),
    );

    let windows = h.scheduler.list_bookable_windows(SERVICE, monday()).unwrap();
    let at = |hh| Utc.with_ymd_and_hms(2025, 6, 16, hh, 0, 0).unwrap();
    assert_eq!(windows, vec![window(at(10), at(14))]);
}

#[test]
fn test_windows_resolve_in_configured_zone() {
    let h = harness_in(chrono_tz::Europe::Berlin);
    h.tuesday_morning();

    // Berlin is UTC+2 in June
    let windows = h.scheduler.list_bookable_windows(SERVICE, tuesday()).unwrap();
    assert_eq!(windows, vec![window(tue(7, 0), tue(10, 0))]);

    assert!(h.book(tue(7, 0), tue(7, 30)).is_ok());
    let err = h.book(tue(10, 0), tue(10, 30)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutsideWorkingHours);
}

#[test]
fn test_overlapping_working_hours_surface_on_booking() {
    let h = harness();
    h.working_hour("a", 2, "09:00", "12:00");
    h.working_hour("b", 2, "11:00", "14:00");

    let err = h.book(tue(9, 0), tue(9, 30)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OverlappingWorkingHours);
    assert!(err.is_data_integrity());
}

#[test]
fn test_ambiguous_custom_rules_surface_on_listing() {
    let h = harness();
    h.calendar_rule("a", CalendarRuleType::CustomDay, tuesday(), Some(("09:00", "12:00")));
    h.calendar_rule("b", CalendarRuleType::CustomDay, tuesday(), Some(("13:00", "16:00")));

    let err = h.scheduler.list_bookable_windows(SERVICE, tuesday()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmbiguousCalendarRule);
}

// ── Rejections ──

#[test]
fn test_outside_working_hours_lists_windows() {
    let h = harness();
    h.tuesday_morning();

    let err = h.book(tue(11, 45), tue(12, 15)).unwrap_err();
    match &err {
        SchedulingError::OutsideWorkingHours { windows } => {
            assert_eq!(windows, &vec![window(tue(9, 0), tue(12, 0))]);
        }
        other => panic!("expected outside working hours, got {other:?}"),
    }
    assert_eq!(err.to_json()["kind"], "outside_working_hours");
}

#[test]
fn test_validation_errors() {
    let h = harness();
    h.tuesday_morning();

    let err = h.book(tue(10, 0), tue(10, 0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRange);

    let err = h
        .book(tue(23, 30), tue(23, 30) + Duration::hours(1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CrossesDayBoundary);

    h.clock.set(tue(9, 10));
    let err = h.book(tue(9, 0), tue(9, 30)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StartsInPast);
}

#[test]
fn test_walk_in_may_start_in_the_past() {
    let h = harness();
    h.tuesday_morning();
    h.clock.set(tue(9, 10));

    let reservation = h
        .scheduler
        .book(
            &BookingRequest::online("user-1", SERVICE, tue(9, 0))
                .by_staff(ReservationSource::WalkIn, "staff-1"),
        )
        .unwrap();
    assert_eq!(reservation.status, ReservationStatus::Confirmed);
    assert_eq!(reservation.created_by_id.as_deref(), Some("staff-1"));
    assert_eq!(reservation.created_at, tue(9, 10));
}

#[test]
fn test_phone_booking_without_staff_stays_pending() {
    let h = harness();
    h.tuesday_morning();

    let request = BookingRequest {
        source: ReservationSource::Phone,
        ..BookingRequest::online("user-1", SERVICE, tue(9, 0))
    };
    let reservation = h.scheduler.book(&request).unwrap();
    assert_eq!(reservation.status, ReservationStatus::Pending);
    assert!(reservation.created_by_id.is_none());
}

#[test]
fn test_inactive_and_deleted_services_are_unavailable() {
    let h = harness();
    for (id, is_active, deleted_at) in [
        ("svc-off", false, None),
        ("svc-gone", true, Some(Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap())),
    ] {
        h.store
            .insert_service(&Service {
                id: id.to_string(),
                title: "Retired".to_string(),
                duration_minutes: 30,
                price_cents: None,
                is_active,
                deleted_at,
                created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            })
            .unwrap();

        let err = h
            .scheduler
            .book(&BookingRequest::online("user-1", id, tue(9, 0)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    }
}

#[test]
fn test_canceled_reservation_frees_its_slot() {
    let h = harness();
    h.tuesday_morning();

    let first = h.book(tue(9, 0), tue(10, 0)).unwrap();
    assert_eq!(
        h.book(tue(9, 0), tue(10, 0)).unwrap_err().kind(),
        ErrorKind::SlotConflict
    );

    h.scheduler
        .transition_status(&first.id, ReservationStatus::Canceled)
        .unwrap();
    assert!(h.book(tue(9, 0), tue(10, 0)).is_ok());
}

#[test]
fn test_slot_conflict_payload() {
    let h = harness();
    h.tuesday_morning();
    let first = h.book(tue(9, 0), tue(9, 30)).unwrap();

    let body = h.book(tue(9, 0), tue(9, 30)).unwrap_err().to_json();
    assert_eq!(body["kind"], "slot_conflict");
    assert_eq!(body["conflict"]["reservation_id"], first.id.as_str());
    assert_eq!(body["conflict"]["window"]["start"], "2025-06-17T09:00:00Z");
}

// ── Status transitions ──

#[test]
fn test_cancel_succeeds_once() {
    let h = harness();
    h.tuesday_morning();
    let reservation = h.book(tue(9, 0), tue(9, 30)).unwrap();
    h.clock.set(tue(8, 0));

    let canceled = h
        .scheduler
        .transition_status_from(
            &reservation.id,
            ReservationStatus::Pending,
            ReservationStatus::Canceled,
        )
        .unwrap();
    assert_eq!(canceled.status, ReservationStatus::Canceled);
    assert_eq!(canceled.canceled_at, Some(tue(8, 0)));

    let err = h
        .scheduler
        .transition_status_from(
            &reservation.id,
            ReservationStatus::Pending,
            ReservationStatus::Canceled,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConcurrentStatusChange);

    let err = h
        .scheduler
        .transition_status(&reservation.id, ReservationStatus::Canceled)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalStatusTransition);

    // canceled_at is written once
    let stored = h.scheduler.reservation(&reservation.id).unwrap();
    assert_eq!(stored.canceled_at, Some(tue(8, 0)));
}

#[test]
fn test_full_lifecycle_then_done_is_final() {
    let h = harness();
    h.tuesday_morning();
    let reservation = h.book(tue(9, 0), tue(9, 30)).unwrap();

    for target in [
        ReservationStatus::Confirmed,
        ReservationStatus::Paid,
        ReservationStatus::Done,
    ] {
        let updated = h
            .scheduler
            .transition_status(&reservation.id, target)
            .unwrap();
        assert_eq!(updated.status, target);
    }

    for target in [
        ReservationStatus::Pending,
        ReservationStatus::Confirmed,
        ReservationStatus::Paid,
        ReservationStatus::Done,
        ReservationStatus::Canceled,
    ] {
        let err = h
            .scheduler
            .transition_status(&reservation.id, target)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalStatusTransition);
    }

    // DONE still occupies its slot
    assert_eq!(
        h.book(tue(9, 0), tue(9, 30)).unwrap_err().kind(),
        ErrorKind::SlotConflict
    );
}

#[test]
fn test_unknown_reservation() {
    let h = harness();
    let err = h
        .scheduler
        .transition_status("missing", ReservationStatus::Confirmed)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReservationNotFound);
}

// ── Suggestions ──

#[test]
fn test_suggested_slots_skip_booked_time() {
    let h = harness();
    h.tuesday_morning();
    h.book(tue(9, 30), tue(10, 0)).unwrap();

    let slots = h.scheduler.suggest_slots(SERVICE, tuesday(), None).unwrap();
    let starts: Vec<DateTime<Utc>> = slots.iter().map(|s| s.start).collect();
    assert_eq!(
        starts,
        vec![tue(9, 0), tue(10, 0), tue(10, 30), tue(11, 0), tue(11, 30)]
    );

    // Every suggestion is bookable right now
    for slot in &slots {
        let result = h
            .scheduler
            .check_availability(SERVICE, slot.start, slot.end)
            .unwrap();
        assert!(result.is_available(), "{slot:?}");
    }
}

#[test]
fn test_suggested_slots_for_longer_booking() {
    let h = harness();
    h.tuesday_morning();
    h.book(tue(10, 0), tue(10, 30)).unwrap();

    let slots = h.scheduler.suggest_slots(SERVICE, tuesday(), Some(60)).unwrap();
    assert_eq!(
        slots,
        vec![
            window(tue(9, 0), tue(10, 0)),
            window(tue(10, 30), tue(11, 30)),
            window(tue(11, 0), tue(12, 0)),
        ]
    );
}

#[test]
fn test_no_suggestions_on_day_off() {
    let h = harness();
    h.tuesday_morning();
    h.calendar_rule("closed", CalendarRuleType::DayOff, tuesday(), None);

    assert!(h.scheduler.suggest_slots(SERVICE, tuesday(), None).unwrap().is_empty());
}
