use chrono::{DateTime, Utc};

use crate::models::{Reservation, ReservationSource, ReservationStatus, TimeWindow};

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub user_id: String,
    pub service_id: String,
    pub start_at: DateTime<Utc>,
    /// Defaults to `start_at` plus the service's duration.
    pub end_at: Option<DateTime<Utc>>,
    pub source: ReservationSource,
    /// Staff member booking on the customer's behalf.
    pub acting_staff_id: Option<String>,
    /// Record a booking whose start has already passed.
    pub backfill: bool,
}

impl BookingRequest {
    pub fn online(user_id: &str, service_id: &str, start_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            service_id: service_id.to_string(),
            start_at,
            end_at: None,
            source: ReservationSource::Online,
            acting_staff_id: None,
            backfill: false,
        }
    }

    pub fn ending_at(mut self, end_at: DateTime<Utc>) -> Self {
        self.end_at = Some(end_at);
        self
    }

    pub fn by_staff(mut self, source: ReservationSource, staff_id: &str) -> Self {
        self.source = source;
        self.acting_staff_id = Some(staff_id.to_string());
        self
    }

    pub fn allows_past_start(&self) -> bool {
        self.backfill || self.source == ReservationSource::WalkIn
    }
}

/// Staff-taken walk-in and phone bookings skip the confirmation step.
pub fn initial_status(source: ReservationSource, acting_staff_id: Option<&str>) -> ReservationStatus {
    if source.is_staff_assisted() && acting_staff_id.is_some() {
        ReservationStatus::Confirmed
    } else {
        ReservationStatus::Pending
    }
}

pub fn new_reservation(
    request: &BookingRequest,
    window: TimeWindow,
    now: DateTime<Utc>,
) -> Reservation {
    Reservation {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: request.user_id.clone(),
        service_id: request.service_id.clone(),
        start_at: window.start,
        end_at: window.end,
        status: initial_status(request.source, request.acting_staff_id.as_deref()),
        source: request.source,
        created_by_id: request.acting_staff_id.clone(),
        canceled_at: None,
        created_at: now,
        updated_at: now,
    }
}
