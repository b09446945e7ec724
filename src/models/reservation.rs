use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::TimeWindow;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub user_id: String,
    pub service_id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: ReservationStatus,
    pub source: ReservationSource,
    /// Staff member who booked on the customer's behalf; `None` for
    /// self-service bookings.
    pub created_by_id: Option<String>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start_at,
            end: self.end_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Paid,
    Done,
    Canceled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::Paid => "PAID",
            ReservationStatus::Done => "DONE",
            ReservationStatus::Canceled => "CANCELED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ReservationStatus::Pending),
            "CONFIRMED" => Some(ReservationStatus::Confirmed),
            "PAID" => Some(ReservationStatus::Paid),
            "DONE" => Some(ReservationStatus::Done),
            "CANCELED" => Some(ReservationStatus::Canceled),
            _ => None,
        }
    }

    /// Active reservations take part in conflict detection.
    pub fn is_active(&self) -> bool {
        *self != ReservationStatus::Canceled
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationStatus::Done | ReservationStatus::Canceled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationSource {
    Online,
    WalkIn,
    Phone,
}

impl ReservationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationSource::Online => "ONLINE",
            ReservationSource::WalkIn => "WALK_IN",
            ReservationSource::Phone => "PHONE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ONLINE" => Some(ReservationSource::Online),
            "WALK_IN" => Some(ReservationSource::WalkIn),
            "PHONE" => Some(ReservationSource::Phone),
            _ => None,
        }
    }

    /// Sources where staff take the booking in person or on the line.
    pub fn is_staff_assisted(&self) -> bool {
        matches!(self, ReservationSource::WalkIn | ReservationSource::Phone)
    }
}
