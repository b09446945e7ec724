use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::models::{ReservationStatus, TimeWindow};

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("invalid range: end {end} is not after start {start}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("local time {time} on {date} does not resolve to a single instant in {zone}")]
    InvalidTimeZoneResolution {
        date: NaiveDate,
        time: String,
        zone: String,
    },

    #[error("reservation crosses a day boundary")]
    CrossesDayBoundary,

    #[error("requested start is in the past")]
    StartsInPast,

    #[error("requested time is outside bookable hours")]
    OutsideWorkingHours { windows: Vec<TimeWindow> },

    #[error("time slot conflicts with reservation {reservation_id}")]
    SlotConflict {
        reservation_id: String,
        window: TimeWindow,
    },

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("ambiguous calendar rules on {date}: {}", rule_ids.join(", "))]
    AmbiguousCalendarRule {
        date: NaiveDate,
        rule_ids: Vec<String>,
    },

    #[error("working hours {first} and {second} overlap on weekday {weekday}")]
    OverlappingWorkingHours {
        weekday: u8,
        first: String,
        second: String,
    },

    #[error("malformed schedule data: {0}")]
    MalformedSchedule(String),

    #[error("illegal status transition: {} -> {}", from.as_str(), to.as_str())]
    IllegalStatusTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },

    #[error("reservation {id} is no longer {}", expected.as_str())]
    ConcurrentStatusChange {
        id: String,
        expected: ReservationStatus,
    },

    #[error("reservation not found: {0}")]
    ReservationNotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Stable classification of a [`SchedulingError`], suitable for callers that
/// branch on the failure rather than on its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRange,
    InvalidTimeZoneResolution,
    CrossesDayBoundary,
    StartsInPast,
    OutsideWorkingHours,
    SlotConflict,
    ServiceUnavailable,
    AmbiguousCalendarRule,
    OverlappingWorkingHours,
    MalformedSchedule,
    IllegalStatusTransition,
    ConcurrentStatusChange,
    ReservationNotFound,
    Storage,
}

impl SchedulingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulingError::InvalidRange { .. } => ErrorKind::InvalidRange,
            SchedulingError::InvalidTimeZoneResolution { .. } => {
                ErrorKind::InvalidTimeZoneResolution
            }
            SchedulingError::CrossesDayBoundary => ErrorKind::CrossesDayBoundary,
            SchedulingError::StartsInPast => ErrorKind::StartsInPast,
            SchedulingError::OutsideWorkingHours { .. } => ErrorKind::OutsideWorkingHours,
            SchedulingError::SlotConflict { .. } => ErrorKind::SlotConflict,
            SchedulingError::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            SchedulingError::AmbiguousCalendarRule { .. } => ErrorKind::AmbiguousCalendarRule,
            SchedulingError::OverlappingWorkingHours { .. } => {
                ErrorKind::OverlappingWorkingHours
            }
            SchedulingError::MalformedSchedule(_) => ErrorKind::MalformedSchedule,
            SchedulingError::IllegalStatusTransition { .. } => {
                ErrorKind::IllegalStatusTransition
            }
            SchedulingError::ConcurrentStatusChange { .. } => ErrorKind::ConcurrentStatusChange,
            SchedulingError::ReservationNotFound(_) => ErrorKind::ReservationNotFound,
            SchedulingError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Configuration problems that an operator has to fix; retrying with a
    /// different slot will not help.
    pub fn is_data_integrity(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::AmbiguousCalendarRule
                | ErrorKind::OverlappingWorkingHours
                | ErrorKind::MalformedSchedule
        )
    }

    /// Rejection body for callers that surface the failure to a user.
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "kind": self.kind(),
            "error": self.to_string(),
        });

        match self {
            SchedulingError::SlotConflict {
                reservation_id,
                window,
            } => {
                body["conflict"] = serde_json::json!({
                    "reservation_id": reservation_id,
                    "window": window,
                });
            }
            SchedulingError::OutsideWorkingHours { windows } => {
                body["bookable_windows"] = serde_json::json!(windows);
            }
            // Storage details stay in the logs.
            SchedulingError::Storage(_) => {
                body["error"] = serde_json::json!("internal storage error");
            }
            _ => {}
        }

        body
    }
}
