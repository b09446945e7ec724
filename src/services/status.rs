use chrono::{DateTime, Utc};

use crate::errors::SchedulingError;
use crate::models::{Reservation, ReservationStatus};
use crate::repository::StatusUpdate;

/// Legal lifecycle moves. Same-state moves are not transitions.
pub fn can_transition(from: ReservationStatus, to: ReservationStatus) -> bool {
    use crate::models::ReservationStatus::*;

    if from.is_terminal() {
        return false;
    }
    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Pending, Canceled)
            | (Confirmed, Paid)
            | (Confirmed, Canceled)
            | (Paid, Done)
            | (Paid, Canceled)
    )
}

/// Build the compare-and-swap write that moves `reservation` from
/// `expected` to `target`.
///
/// `expected` is the status the caller believes is stored; if the snapshot
/// already disagrees the change is reported as concurrent without touching
/// storage.
pub fn plan_transition(
    reservation: &Reservation,
    expected: ReservationStatus,
    target: ReservationStatus,
    now: DateTime<Utc>,
) -> Result<StatusUpdate, SchedulingError> {
    if reservation.status != expected {
        return Err(SchedulingError::ConcurrentStatusChange {
            id: reservation.id.clone(),
            expected,
        });
    }

    if !can_transition(expected, target) {
        return Err(SchedulingError::IllegalStatusTransition {
            from: expected,
            to: target,
        });
    }

    let canceled_at = if target == ReservationStatus::Canceled {
        if reservation.canceled_at.is_some() {
            // Only reachable with corrupt rows: canceled_at without CANCELED.
            return Err(SchedulingError::IllegalStatusTransition {
                from: expected,
                to: target,
            });
        }
        Some(now)
    } else {
        None
    };

    Ok(StatusUpdate {
        id: reservation.id.clone(),
        new_status: target,
        expected_current: expected,
        canceled_at,
        updated_at: now,
    })
}
