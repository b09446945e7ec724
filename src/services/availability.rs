use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::errors::SchedulingError;
use crate::models::TimeWindow;
use crate::repository::{ListOverlappingQuery, Repositories};
use crate::services::schedule;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AvailabilityResult {
    Available {
        window: TimeWindow,
    },
    OutsideWorkingHours {
        windows: Vec<TimeWindow>,
    },
    SlotConflict {
        reservation_id: String,
        window: TimeWindow,
    },
}

impl AvailabilityResult {
    pub fn is_available(&self) -> bool {
        matches!(self, AvailabilityResult::Available { .. })
    }

    /// The admitted window, or the rejection as an error.
    pub fn into_result(self) -> Result<TimeWindow, SchedulingError> {
        match self {
            AvailabilityResult::Available { window } => Ok(window),
            AvailabilityResult::OutsideWorkingHours { windows } => {
                Err(SchedulingError::OutsideWorkingHours { windows })
            }
            AvailabilityResult::SlotConflict {
                reservation_id,
                window,
            } => Err(SchedulingError::SlotConflict {
                reservation_id,
                window,
            }),
        }
    }
}

/// A range that passed the side-effect-free checks, with the local date it
/// belongs to.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedRange {
    pub window: TimeWindow,
    pub date: NaiveDate,
}

/// Checks that need no storage access.
///
/// `allow_past` lifts the "start must not be before now" rule for backfilled
/// and walk-in bookings.
pub fn validate_range(
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    now: DateTime<Utc>,
    zone: Tz,
    allow_past: bool,
) -> Result<ValidatedRange, SchedulingError> {
    let window = TimeWindow::new(start_at, end_at)?;

    if !allow_past && start_at < now {
        return Err(SchedulingError::StartsInPast);
    }

    let start_local = start_at.with_timezone(&zone);
    let end_local = end_at.with_timezone(&zone);
    let date = start_local.date_naive();
    let ends_same_day = end_local.date_naive() == date;
    let ends_at_next_midnight =
        Some(end_local.date_naive()) == date.succ_opt() && end_local.time() == NaiveTime::MIN;

    if !ends_same_day && !ends_at_next_midnight {
        return Err(SchedulingError::CrossesDayBoundary);
    }

    Ok(ValidatedRange { window, date })
}

/// Schedule containment then overlap against active reservations.
///
/// Callers that act on an `Available` result must hold the service lock
/// across this call and the insert.
pub fn evaluate(
    repos: &Repositories,
    service_id: &str,
    range: &ValidatedRange,
    zone: Tz,
) -> Result<AvailabilityResult, SchedulingError> {
    let windows = schedule::day_schedule(repos, service_id, range.date, zone)?;
    if !windows.iter().any(|w| w.contains(&range.window)) {
        return Ok(AvailabilityResult::OutsideWorkingHours { windows });
    }

    let query = ListOverlappingQuery::active(service_id, range.window);
    let conflicts = repos.reservations.list_overlapping(&query)?;
    // The query is ordered by start; report the earliest clash.
    if let Some(conflict) = conflicts.into_iter().find(|r| r.status.is_active()) {
        return Ok(AvailabilityResult::SlotConflict {
            window: conflict.window(),
            reservation_id: conflict.id,
        });
    }

    Ok(AvailabilityResult::Available {
        window: range.window,
    })
}
