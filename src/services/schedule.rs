use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::errors::SchedulingError;
use crate::models::{weekday_of, CalendarRule, TimeWindow, WorkingHour};
use crate::repository::Repositories;

/// Bookable windows of a service on `date`, ordered and non-overlapping.
pub fn day_schedule(
    repos: &Repositories,
    service_id: &str,
    date: NaiveDate,
    zone: Tz,
) -> Result<Vec<TimeWindow>, SchedulingError> {
    let rules = repos.calendar_rules.list_active(service_id, date)?;
    let hours = if rules.iter().any(|r| r.is_active && r.covers(date)) {
        // An override decides the day; the weekly template is not consulted.
        Vec::new()
    } else {
        repos.working_hours.list_active(service_id, weekday_of(date))?
    };

    let result = resolve_windows(date, zone, &rules, &hours);
    match &result {
        Ok(windows) => {
            tracing::debug!(service_id, %date, windows = windows.len(), "resolved day schedule");
        }
        Err(e) if e.is_data_integrity() => {
            tracing::warn!(service_id, %date, error = %e, "service schedule is misconfigured");
        }
        Err(_) => {}
    }
    result
}

/// Merge calendar overrides with the weekly template for one date.
///
/// Precedence: any OFF rule closes the day; otherwise the most specific
/// (shortest) custom rule replaces the template; otherwise the weekly rows
/// apply. Two custom rules of equal, smallest span are a configuration error.
pub fn resolve_windows(
    date: NaiveDate,
    zone: Tz,
    rules: &[CalendarRule],
    hours: &[WorkingHour],
) -> Result<Vec<TimeWindow>, SchedulingError> {
    let covering: Vec<&CalendarRule> = rules
        .iter()
        .filter(|r| r.is_active && r.covers(date))
        .collect();

    if covering.iter().any(|r| r.rule_type.is_off()) {
        return Ok(Vec::new());
    }

    if let Some(rule) = most_specific_custom(date, &covering)? {
        let (Some(start), Some(end)) = (rule.start_time.as_deref(), rule.end_time.as_deref()) else {
            return Err(SchedulingError::MalformedSchedule(format!(
                "custom calendar rule {} has no start/end time",
                rule.id
            )));
        };
        return Ok(vec![TimeWindow::on_date(date, start, end, zone)?]);
    }

    weekly_windows(date, zone, hours)
}

fn most_specific_custom<'a>(
    date: NaiveDate,
    covering: &[&'a CalendarRule],
) -> Result<Option<&'a CalendarRule>, SchedulingError> {
    let Some(narrowest) = covering.iter().map(|r| r.span_days()).min() else {
        return Ok(None);
    };

    let candidates: Vec<&CalendarRule> = covering
        .iter()
        .copied()
        .filter(|r| r.span_days() == narrowest)
        .collect();

    match candidates.as_slice() {
        [only] => Ok(Some(*only)),
        _ => Err(SchedulingError::AmbiguousCalendarRule {
            date,
            rule_ids: candidates.iter().map(|r| r.id.clone()).collect(),
        }),
    }
}

fn weekly_windows(
    date: NaiveDate,
    zone: Tz,
    hours: &[WorkingHour],
) -> Result<Vec<TimeWindow>, SchedulingError> {
    let weekday = weekday_of(date);
    let mut windows = Vec::with_capacity(hours.len());
    for hour in hours.iter().filter(|h| h.is_active && h.weekday == weekday) {
        windows.push((hour.window_on(date, zone)?, hour.id.as_str()));
    }
    windows.sort_by_key(|(w, _)| w.start);

    // Sorted by start, so any overlap shows up between neighbours.
    for pair in windows.windows(2) {
        let ((a, a_id), (b, b_id)) = (&pair[0], &pair[1]);
        if a.overlaps(b) {
            return Err(SchedulingError::OverlappingWorkingHours {
                weekday,
                first: a_id.to_string(),
                second: b_id.to_string(),
            });
        }
    }

    Ok(windows.into_iter().map(|(w, _)| w).collect())
}
