use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::clock::{Clock, SystemClock};
use crate::config::SchedulerConfig;
use crate::db::SqliteStore;
use crate::errors::SchedulingError;
use crate::models::{Reservation, ReservationStatus, Service, TimeWindow};
use crate::repository::{InsertOutcome, ListOverlappingQuery, Repositories};
use crate::services::admission::{self, BookingRequest};
use crate::services::availability::{self, AvailabilityResult, ValidatedRange};
use crate::services::locks::{self, ServiceLocks};
use crate::services::{schedule, slots, status};

const DEFAULT_SLOT_STEP_MINUTES: u32 = 15;

/// Entry point for booking, availability and status changes.
///
/// Admission is serialized per service by a lock table owned by this value,
/// and the store rejects overlapping inserts from any other writer.
pub struct Scheduler {
    repos: Repositories,
    clock: Arc<dyn Clock>,
    zone: Tz,
    slot_step: Duration,
    locks: ServiceLocks,
}

impl Scheduler {
    pub fn new(repos: Repositories, clock: Arc<dyn Clock>, zone: Tz) -> Self {
        Self {
            repos,
            clock,
            zone,
            slot_step: Duration::minutes(i64::from(DEFAULT_SLOT_STEP_MINUTES)),
            locks: ServiceLocks::new(),
        }
    }

    pub fn with_slot_step(mut self, minutes: u32) -> Self {
        self.slot_step = Duration::minutes(i64::from(minutes.max(1)));
        self
    }

    /// SQLite store at `config.database_url`, system clock.
    pub fn open(config: &SchedulerConfig) -> anyhow::Result<Self> {
        let zone = config.zone()?;
        let store = Arc::new(SqliteStore::open(&config.database_url)?);
        tracing::info!(database = %config.database_url, zone = %zone.name(), "scheduler ready");
        Ok(Self::new(Repositories::from_store(store), Arc::new(SystemClock), zone)
            .with_slot_step(config.slot_step_minutes))
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    fn bookable_service(&self, service_id: &str) -> Result<Service, SchedulingError> {
        match self.repos.services.get(service_id)? {
            Some(service) if service.is_bookable() => Ok(service),
            Some(_) => Err(SchedulingError::ServiceUnavailable(format!(
                "service {service_id} is inactive or deleted"
            ))),
            None => Err(SchedulingError::ServiceUnavailable(format!(
                "service {service_id} does not exist"
            ))),
        }
    }

    pub fn list_bookable_windows(
        &self,
        service_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<TimeWindow>, SchedulingError> {
        let service = self.bookable_service(service_id)?;
        schedule::day_schedule(&self.repos, &service.id, date, self.zone)
    }

    /// Read-only admission check for an online booking; nothing is reserved.
    pub fn check_availability(
        &self,
        service_id: &str,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> Result<AvailabilityResult, SchedulingError> {
        let service = self.bookable_service(service_id)?;
        let range =
            availability::validate_range(start_at, end_at, self.clock.now(), self.zone, false)?;
        availability::evaluate(&self.repos, &service.id, &range, self.zone)
    }

    /// Read-only check of exactly what [`Scheduler::book`] would decide for
    /// `request` right now, including the walk-in and backfill exemption.
    pub fn check_request(
        &self,
        request: &BookingRequest,
    ) -> Result<AvailabilityResult, SchedulingError> {
        let (service, range) = self.prepare(request)?;
        availability::evaluate(&self.repos, &service.id, &range, self.zone)
    }

    /// Checks that run before any lock is taken.
    fn prepare(
        &self,
        request: &BookingRequest,
    ) -> Result<(Service, ValidatedRange), SchedulingError> {
        let service = self.bookable_service(&request.service_id)?;
        let end_at = request
            .end_at
            .unwrap_or_else(|| request.start_at + service.default_length());
        let range = availability::validate_range(
            request.start_at,
            end_at,
            self.clock.now(),
            self.zone,
            request.allows_past_start(),
        )?;
        Ok((service, range))
    }

    /// Admit and persist a reservation, or reject it without side effects.
    ///
    /// The per-service lock serializes bookers sharing this `Scheduler`. The
    /// store repeats the overlap check inside its own write transaction, which
    /// covers other `Scheduler`s and processes using the same database.
    pub fn book(&self, request: &BookingRequest) -> Result<Reservation, SchedulingError> {
        let (service, range) = self.prepare(request)?;

        let handle = self.locks.handle(&service.id);
        let _guard = locks::acquire(&handle);

        let outcome = availability::evaluate(&self.repos, &service.id, &range, self.zone)?;
        let admitted = outcome.into_result().and_then(|window| {
            let reservation = admission::new_reservation(request, window, self.clock.now());
            match self.repos.reservations.insert(&reservation)? {
                InsertOutcome::Inserted(stored) => Ok(stored),
                InsertOutcome::Conflict(existing) => Err(SchedulingError::SlotConflict {
                    window: existing.window(),
                    reservation_id: existing.id,
                }),
            }
        });

        match admitted {
            Ok(stored) => {
                tracing::info!(
                    reservation_id = %stored.id,
                    service_id = %stored.service_id,
                    status = stored.status.as_str(),
                    source = stored.source.as_str(),
                    "reservation admitted"
                );
                Ok(stored)
            }
            Err(e) => {
                tracing::warn!(
                    service_id = %service.id,
                    user_id = %request.user_id,
                    start_at = %request.start_at,
                    error = %e,
                    "booking rejected"
                );
                Err(e)
            }
        }
    }

    pub fn reservation(&self, id: &str) -> Result<Reservation, SchedulingError> {
        self.repos
            .reservations
            .get(id)?
            .ok_or_else(|| SchedulingError::ReservationNotFound(id.to_string()))
    }

    /// Move a reservation from whatever status is stored now to `target`.
    pub fn transition_status(
        &self,
        id: &str,
        target: ReservationStatus,
    ) -> Result<Reservation, SchedulingError> {
        let reservation = self.reservation(id)?;
        let expected = reservation.status;
        self.apply_transition(&reservation, expected, target)
    }

    /// Move a reservation to `target` only if it is still in `expected`.
    pub fn transition_status_from(
        &self,
        id: &str,
        expected: ReservationStatus,
        target: ReservationStatus,
    ) -> Result<Reservation, SchedulingError> {
        let reservation = self.reservation(id)?;
        self.apply_transition(&reservation, expected, target)
    }

    fn apply_transition(
        &self,
        reservation: &Reservation,
        expected: ReservationStatus,
        target: ReservationStatus,
    ) -> Result<Reservation, SchedulingError> {
        let update = status::plan_transition(reservation, expected, target, self.clock.now())?;

        match self.repos.reservations.update_status(&update)? {
            Some(updated) => {
                tracing::info!(
                    reservation_id = %updated.id,
                    from = expected.as_str(),
                    to = target.as_str(),
                    "reservation status changed"
                );
                Ok(updated)
            }
            None => Err(SchedulingError::ConcurrentStatusChange {
                id: reservation.id.clone(),
                expected,
            }),
        }
    }

    /// Free start slots on `date` for a booking of `length_minutes`
    /// (the service duration when `None`).
    pub fn suggest_slots(
        &self,
        service_id: &str,
        date: NaiveDate,
        length_minutes: Option<u32>,
    ) -> Result<Vec<TimeWindow>, SchedulingError> {
        let service = self.bookable_service(service_id)?;
        let length = length_minutes
            .map(|m| Duration::minutes(i64::from(m)))
            .unwrap_or_else(|| service.default_length());

        let windows = schedule::day_schedule(&self.repos, &service.id, date, self.zone)?;
        let (Some(first), Some(last)) = (windows.first(), windows.last()) else {
            return Ok(Vec::new());
        };
        let day = TimeWindow {
            start: first.start,
            end: last.end,
        };

        let mut busy: Vec<TimeWindow> = self
            .repos
            .reservations
            .list_overlapping(&ListOverlappingQuery::active(&service.id, day))?
            .iter()
            .filter(|r| r.status.is_active())
            .map(Reservation::window)
            .collect();
        busy.sort_by_key(|w| w.start);

        let free = slots::subtract_windows(&windows, &busy);
        Ok(slots::candidate_slots(
            &free,
            length,
            self.slot_step,
            self.clock.now(),
        ))
    }
}
