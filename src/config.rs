use std::env;

use chrono_tz::Tz;

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub database_url: String,
    /// IANA zone that working hours and calendar rules are written in.
    pub timezone: String,
    /// Spacing of suggested start times.
    pub slot_step_minutes: u32,
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "slotbook.db".to_string()),
            timezone: env::var("TIMEZONE").unwrap_or_else(|_| "UTC".to_string()),
            slot_step_minutes: env::var("SLOT_STEP_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|m| *m > 0)
                .unwrap_or(15),
        }
    }

    pub fn zone(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| anyhow::anyhow!("unknown time zone: {}", self.timezone))
    }
}
