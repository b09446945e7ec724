use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::errors::SchedulingError;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Half-open `[start, end)` interval between two instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, SchedulingError> {
        if end <= start {
            return Err(SchedulingError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Resolve a local `HH:MM` band on `date` in `zone`.
    pub fn on_date(
        date: NaiveDate,
        start: &str,
        end: &str,
        zone: Tz,
    ) -> Result<Self, SchedulingError> {
        let start_local = LocalTime::parse(start)?;
        let end_local = LocalTime::parse(end)?;
        if end_local <= start_local {
            return Err(SchedulingError::MalformedSchedule(format!(
                "band {start}-{end} does not end after it starts"
            )));
        }
        Self::new(
            start_local.resolve(date, zone)?,
            end_local.resolve(date, zone)?,
        )
    }

    /// Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &TimeWindow) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn duration_minutes(&self) -> Result<i64, SchedulingError> {
        if self.end <= self.start {
            return Err(SchedulingError::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok((self.end - self.start).num_minutes())
    }
}

/// Wall-clock time of day as minutes past local midnight. `24:00` is accepted
/// as the end of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalTime(u32);

impl LocalTime {
    pub fn parse(s: &str) -> Result<Self, SchedulingError> {
        let malformed = || SchedulingError::MalformedSchedule(format!("invalid time of day: {s}"));

        let (hour, minute) = s.trim().split_once(':').ok_or_else(malformed)?;
        if hour.len() != 2 || minute.len() != 2 {
            return Err(malformed());
        }
        let hour: u32 = hour.parse().map_err(|_| malformed())?;
        let minute: u32 = minute.parse().map_err(|_| malformed())?;
        if minute > 59 || hour > 24 || (hour == 24 && minute != 0) {
            return Err(malformed());
        }
        Ok(Self(hour * 60 + minute))
    }

    /// The instant this local time denotes on `date`. Times skipped or
    /// repeated by a DST shift are rejected rather than guessed.
    pub fn resolve(self, date: NaiveDate, zone: Tz) -> Result<DateTime<Utc>, SchedulingError> {
        let (day, minutes) = if self.0 == MINUTES_PER_DAY {
            let next = date
                .succ_opt()
                .ok_or_else(|| SchedulingError::MalformedSchedule(format!("no day after {date}")))?;
            (next, 0)
        } else {
            (date, self.0)
        };

        let unresolved = || SchedulingError::InvalidTimeZoneResolution {
            date,
            time: self.to_string(),
            zone: zone.name().to_string(),
        };

        let time = NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0).ok_or_else(unresolved)?;
        zone.from_local_datetime(&day.and_time(time))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(unresolved)
    }
}

impl std::fmt::Display for LocalTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}
