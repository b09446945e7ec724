use chrono::{Datelike, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::errors::SchedulingError;
use crate::models::TimeWindow;

/// Recurring weekly availability band for a service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingHour {
    pub id: String,
    pub service_id: String,
    /// 0 = Sunday through 6 = Saturday.
    pub weekday: u8,
    pub start_time: String,
    pub end_time: String,
    pub is_active: bool,
}

impl WorkingHour {
    pub fn window_on(&self, date: NaiveDate, zone: Tz) -> Result<TimeWindow, SchedulingError> {
        TimeWindow::on_date(date, &self.start_time, &self.end_time, zone)
    }
}

/// Weekday number used by working hour rows.
pub fn weekday_of(date: NaiveDate) -> u8 {
    // num_days_from_sunday is always < 7
    date.weekday().num_days_from_sunday() as u8
}
