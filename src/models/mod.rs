pub mod calendar_rule;
pub mod reservation;
pub mod service;
pub mod time_window;
pub mod working_hour;

pub use calendar_rule::{CalendarRule, CalendarRuleType};
pub use reservation::{Reservation, ReservationSource, ReservationStatus};
pub use service::Service;
pub use time_window::{LocalTime, TimeWindow};
pub use working_hour::{weekday_of, WorkingHour};
