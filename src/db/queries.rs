use anyhow::Context;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::models::{
    CalendarRule, CalendarRuleType, Reservation, ReservationSource, ReservationStatus, Service,
    WorkingHour,
};
use crate::repository::{InsertOutcome, ListOverlappingQuery, StatusUpdate};

// Fixed-width prefix keeps text comparison in SQL consistent with instant order.
const INSTANT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";

fn format_instant(dt: &DateTime<Utc>) -> String {
    dt.format(INSTANT_FORMAT).to_string()
}

fn parse_instant(s: &str) -> anyhow::Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, INSTANT_FORMAT)
        .map(|dt| dt.and_utc())
        .with_context(|| format!("invalid stored timestamp: {s}"))
}

fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| format!("invalid stored date: {s}"))
}

// ── Services ──

pub fn insert_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, title, duration_minutes, price_cents, is_active, deleted_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            service.id,
            service.title,
            service.duration_minutes,
            service.price_cents,
            service.is_active,
            service.deleted_at.as_ref().map(format_instant),
            format_instant(&service.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let row = conn
        .query_row(
            "SELECT id, title, duration_minutes, price_cents, is_active, deleted_at, created_at
             FROM services WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i32>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                ))
            },
        )
        .optional()?;

    let Some((id, title, duration_minutes, price_cents, is_active, deleted_at, created_at)) = row
    else {
        return Ok(None);
    };

    Ok(Some(Service {
        id,
        title,
        duration_minutes,
        price_cents,
        is_active,
        deleted_at: deleted_at.as_deref().map(parse_instant).transpose()?,
        created_at: parse_instant(&created_at)?,
    }))
}

// ── Working Hours ──

pub fn insert_working_hour(conn: &Connection, hour: &WorkingHour) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO working_hours (id, service_id, weekday, start_time, end_time, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            hour.id,
            hour.service_id,
            hour.weekday,
            hour.start_time,
            hour.end_time,
            hour.is_active,
        ],
    )?;
    Ok(())
}

pub fn list_active_working_hours(
    conn: &Connection,
    service_id: &str,
    weekday: u8,
) -> anyhow::Result<Vec<WorkingHour>> {
    let mut stmt = conn.prepare(
        "SELECT id, service_id, weekday, start_time, end_time, is_active
         FROM working_hours
         WHERE service_id = ?1 AND weekday = ?2 AND is_active = 1
         ORDER BY start_time ASC",
    )?;

    let rows = stmt.query_map(params![service_id, weekday], |row| {
        Ok(WorkingHour {
            id: row.get(0)?,
            service_id: row.get(1)?,
            weekday: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            is_active: row.get(5)?,
        })
    })?;

    let mut hours = vec![];
    for row in rows {
        hours.push(row?);
    }
    Ok(hours)
}

// ── Calendar Rules ──

pub fn insert_calendar_rule(conn: &Connection, rule: &CalendarRule) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO calendar_rules (id, service_id, rule_type, start_date, end_date, start_time, end_time, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            rule.id,
            rule.service_id,
            rule.rule_type.as_str(),
            format_date(&rule.start_date),
            rule.end_date.as_ref().map(format_date),
            rule.start_time,
            rule.end_time,
            rule.is_active,
        ],
    )?;
    Ok(())
}

pub fn list_active_calendar_rules(
    conn: &Connection,
    service_id: &str,
    date: NaiveDate,
) -> anyhow::Result<Vec<CalendarRule>> {
    let date = format_date(&date);
    let mut stmt = conn.prepare(
        "SELECT id, service_id, rule_type, start_date, end_date, start_time, end_time, is_active
         FROM calendar_rules
         WHERE service_id = ?1 AND is_active = 1
           AND start_date <= ?2 AND COALESCE(end_date, start_date) >= ?2
         ORDER BY start_date ASC, id ASC",
    )?;

    let rows = stmt.query_map(params![service_id, date], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<String>>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, bool>(7)?,
        ))
    })?;

    let mut rules = vec![];
    for row in rows {
        let (id, service_id, rule_type, start_date, end_date, start_time, end_time, is_active) =
            row?;
        let rule_type = CalendarRuleType::parse(&rule_type)
            .with_context(|| format!("unknown calendar rule type {rule_type} on rule {id}"))?;
        rules.push(CalendarRule {
            id,
            service_id,
            rule_type,
            start_date: parse_date(&start_date)?,
            end_date: end_date.as_deref().map(parse_date).transpose()?,
            start_time,
            end_time,
            is_active,
        });
    }
    Ok(rules)
}

// ── Reservations ──

const RESERVATION_COLUMNS: &str = "id, user_id, service_id, start_at, end_at, status, source, \
     created_by_id, canceled_at, created_at, updated_at";

pub fn create_reservation(conn: &Connection, reservation: &Reservation) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO reservations (id, user_id, service_id, start_at, end_at, status, source, created_by_id, canceled_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            reservation.id,
            reservation.user_id,
            reservation.service_id,
            format_instant(&reservation.start_at),
            format_instant(&reservation.end_at),
            reservation.status.as_str(),
            reservation.source.as_str(),
            reservation.created_by_id,
            reservation.canceled_at.as_ref().map(format_instant),
            format_instant(&reservation.created_at),
            format_instant(&reservation.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_reservation_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Reservation>> {
    let result = conn.query_row(
        &format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?1"),
        params![id],
        |row| Ok(parse_reservation_row(row)),
    );

    match result {
        Ok(reservation) => Ok(Some(reservation?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_overlapping_reservations(
    conn: &Connection,
    query: &ListOverlappingQuery,
) -> anyhow::Result<Vec<Reservation>> {
    let mut sql = format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations \
         WHERE service_id = ?1 AND start_at < ?2 AND end_at > ?3"
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![
        Box::new(query.service_id.clone()),
        Box::new(format_instant(&query.window.end)),
        Box::new(format_instant(&query.window.start)),
    ];

    if !query.exclude_statuses.is_empty() {
        let placeholders: Vec<String> = (0..query.exclude_statuses.len())
            .map(|i| format!("?{}", i + 4))
            .collect();
        sql.push_str(&format!(" AND status NOT IN ({})", placeholders.join(", ")));
        for status in &query.exclude_statuses {
            params_vec.push(Box::new(status.as_str()));
        }
    }
    sql.push_str(" ORDER BY start_at ASC");

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_reservation_row(row)))?;

    let mut reservations = vec![];
    for row in rows {
        reservations.push(row??);
    }
    Ok(reservations)
}

/// Overlap query and insert inside one `BEGIN IMMEDIATE` transaction. The
/// database write lock is held across both, so connections in other
/// processes wait instead of reading the same free slot.
pub fn insert_reservation_unless_overlapping(
    conn: &mut Connection,
    reservation: &Reservation,
) -> anyhow::Result<InsertOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let query = ListOverlappingQuery::active(&reservation.service_id, reservation.window());
    if let Some(conflict) = list_overlapping_reservations(&tx, &query)?.into_iter().next() {
        // Dropping the transaction rolls it back.
        return Ok(InsertOutcome::Conflict(conflict));
    }

    create_reservation(&tx, reservation)?;
    tx.commit()?;
    Ok(InsertOutcome::Inserted(reservation.clone()))
}

/// Compare-and-swap on `status`; `None` when the row is missing or its status
/// moved on.
pub fn update_reservation_status(
    conn: &Connection,
    update: &StatusUpdate,
) -> anyhow::Result<Option<Reservation>> {
    let count = conn.execute(
        "UPDATE reservations
         SET status = ?1, canceled_at = COALESCE(?2, canceled_at), updated_at = ?3
         WHERE id = ?4 AND status = ?5",
        params![
            update.new_status.as_str(),
            update.canceled_at.as_ref().map(format_instant),
            format_instant(&update.updated_at),
            update.id,
            update.expected_current.as_str(),
        ],
    )?;

    if count == 0 {
        return Ok(None);
    }
    get_reservation_by_id(conn, &update.id)
}

fn parse_reservation_row(row: &rusqlite::Row) -> anyhow::Result<Reservation> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let service_id: String = row.get(2)?;
    let start_at: String = row.get(3)?;
    let end_at: String = row.get(4)?;
    let status_str: String = row.get(5)?;
    let source_str: String = row.get(6)?;
    let created_by_id: Option<String> = row.get(7)?;
    let canceled_at: Option<String> = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    let status = ReservationStatus::parse(&status_str)
        .with_context(|| format!("unknown status {status_str} on reservation {id}"))?;
    let source = ReservationSource::parse(&source_str)
        .with_context(|| format!("unknown source {source_str} on reservation {id}"))?;

    Ok(Reservation {
        start_at: parse_instant(&start_at)?,
        end_at: parse_instant(&end_at)?,
        canceled_at: canceled_at.as_deref().map(parse_instant).transpose()?,
        created_at: parse_instant(&created_at)?,
        updated_at: parse_instant(&updated_at)?,
        id,
        user_id,
        service_id,
        status,
        source,
        created_by_id,
    })
}
