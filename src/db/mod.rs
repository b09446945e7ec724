pub mod migrations;
pub mod queries;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use rusqlite::Connection;

use crate::models::{CalendarRule, Reservation, Service, WorkingHour};
use crate::repository::{
    CalendarRuleRepository, InsertOutcome, ListOverlappingQuery, ReservationRepository,
    ServiceRepository, StatusUpdate, WorkingHourRepository,
};

pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).context("failed to open database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;

    // Writers from other processes queue on the file lock rather than fail.
    conn.busy_timeout(Duration::from_secs(5))
        .context("failed to set busy timeout")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// SQLite-backed implementation of every repository the engine consumes.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &str) -> anyhow::Result<Self> {
        Ok(Self::new(init_db(path)?))
    }

    pub fn new(conn: Connection) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
        }
    }

    fn conn(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| anyhow::anyhow!("database connection lock poisoned"))
    }

    pub fn insert_service(&self, service: &Service) -> anyhow::Result<()> {
        queries::insert_service(&*self.conn()?, service)
            .with_context(|| format!("failed to insert service {}", service.id))
    }

    pub fn insert_working_hour(&self, hour: &WorkingHour) -> anyhow::Result<()> {
        queries::insert_working_hour(&*self.conn()?, hour)
            .with_context(|| format!("failed to insert working hour {}", hour.id))
    }

    pub fn insert_calendar_rule(&self, rule: &CalendarRule) -> anyhow::Result<()> {
        queries::insert_calendar_rule(&*self.conn()?, rule)
            .with_context(|| format!("failed to insert calendar rule {}", rule.id))
    }
}

impl ServiceRepository for SqliteStore {
    fn get(&self, service_id: &str) -> anyhow::Result<Option<Service>> {
        queries::get_service(&*self.conn()?, service_id)
            .with_context(|| format!("failed to load service {service_id}"))
    }
}

impl WorkingHourRepository for SqliteStore {
    fn list_active(&self, service_id: &str, weekday: u8) -> anyhow::Result<Vec<WorkingHour>> {
        queries::list_active_working_hours(&*self.conn()?, service_id, weekday)
            .with_context(|| format!("failed to load working hours for service {service_id}"))
    }
}

impl CalendarRuleRepository for SqliteStore {
    fn list_active(&self, service_id: &str, date: NaiveDate) -> anyhow::Result<Vec<CalendarRule>> {
        queries::list_active_calendar_rules(&*self.conn()?, service_id, date)
            .with_context(|| format!("failed to load calendar rules for service {service_id}"))
    }
}

impl ReservationRepository for SqliteStore {
    fn get(&self, id: &str) -> anyhow::Result<Option<Reservation>> {
        queries::get_reservation_by_id(&*self.conn()?, id)
            .with_context(|| format!("failed to load reservation {id}"))
    }

    fn list_overlapping(&self, query: &ListOverlappingQuery) -> anyhow::Result<Vec<Reservation>> {
        queries::list_overlapping_reservations(&*self.conn()?, query).with_context(|| {
            format!(
                "failed to query overlapping reservations for service {}",
                query.service_id
            )
        })
    }

    fn insert(&self, reservation: &Reservation) -> anyhow::Result<InsertOutcome> {
        let mut conn = self.conn()?;
        queries::insert_reservation_unless_overlapping(&mut conn, reservation)
            .with_context(|| format!("failed to insert reservation {}", reservation.id))
    }

    fn update_status(&self, update: &StatusUpdate) -> anyhow::Result<Option<Reservation>> {
        queries::update_reservation_status(&*self.conn()?, update)
            .with_context(|| format!("failed to update status of reservation {}", update.id))
    }
}
