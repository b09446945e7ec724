//! Persistence collaborators the engine reads and writes through.
//!
//! Implementations must be safe to share across request workers. Errors are
//! reported as `anyhow::Error` and surface as `SchedulingError::Storage`.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{CalendarRule, Reservation, ReservationStatus, Service, TimeWindow, WorkingHour};

pub trait ServiceRepository: Send + Sync {
    fn get(&self, service_id: &str) -> anyhow::Result<Option<Service>>;
}

pub trait WorkingHourRepository: Send + Sync {
    /// Active rows for `weekday` (0 = Sunday).
    fn list_active(&self, service_id: &str, weekday: u8) -> anyhow::Result<Vec<WorkingHour>>;
}

pub trait CalendarRuleRepository: Send + Sync {
    /// Active rules whose date span contains `date`.
    fn list_active(&self, service_id: &str, date: NaiveDate) -> anyhow::Result<Vec<CalendarRule>>;
}

#[derive(Debug, Clone)]
pub struct ListOverlappingQuery {
    pub service_id: String,
    pub window: TimeWindow,
    pub exclude_statuses: Vec<ReservationStatus>,
}

impl ListOverlappingQuery {
    /// Reservations that still hold their slot.
    pub fn active(service_id: &str, window: TimeWindow) -> Self {
        Self {
            service_id: service_id.to_string(),
            window,
            exclude_statuses: vec![ReservationStatus::Canceled],
        }
    }
}

/// Compare-and-swap status write.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub id: String,
    pub new_status: ReservationStatus,
    pub expected_current: ReservationStatus,
    pub canceled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Result of [`ReservationRepository::insert`].
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted(Reservation),
    /// Earliest active reservation that already holds part of the window.
    Conflict(Reservation),
}

pub trait ReservationRepository: Send + Sync {
    fn get(&self, id: &str) -> anyhow::Result<Option<Reservation>>;

    /// Reservations of the service whose window overlaps the query window,
    /// ordered by start.
    fn list_overlapping(&self, query: &ListOverlappingQuery) -> anyhow::Result<Vec<Reservation>>;

    /// Inserts unless an active reservation overlaps the window. The check and
    /// the write are one unit for every writer of the store, including other
    /// processes sharing it.
    fn insert(&self, reservation: &Reservation) -> anyhow::Result<InsertOutcome>;

    /// Applies the update only while the stored status still equals
    /// `expected_current`. Returns `None` when no row matched.
    fn update_status(&self, update: &StatusUpdate) -> anyhow::Result<Option<Reservation>>;
}

/// Handles to every collaborator, usually all backed by the same store.
#[derive(Clone)]
pub struct Repositories {
    pub services: Arc<dyn ServiceRepository>,
    pub working_hours: Arc<dyn WorkingHourRepository>,
    pub calendar_rules: Arc<dyn CalendarRuleRepository>,
    pub reservations: Arc<dyn ReservationRepository>,
}

impl Repositories {
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: ServiceRepository
            + WorkingHourRepository
            + CalendarRuleRepository
            + ReservationRepository
            + 'static,
    {
        Self {
            services: store.clone(),
            working_hours: store.clone(),
            calendar_rules: store.clone(),
            reservations: store,
        }
    }
}
