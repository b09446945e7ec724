use chrono::{DateTime, Duration, Utc};

use crate::models::TimeWindow;

/// Remove `busy` from `windows`. Both inputs must be sorted by start.
pub fn subtract_windows(windows: &[TimeWindow], busy: &[TimeWindow]) -> Vec<TimeWindow> {
    let mut free = Vec::new();
    let mut first_relevant = 0;

    for w in windows {
        let mut cursor = w.start;

        while first_relevant < busy.len() && busy[first_relevant].end <= cursor {
            first_relevant += 1;
        }

        for b in busy[first_relevant..].iter().take_while(|b| b.start < w.end) {
            if b.start > cursor {
                free.push(TimeWindow {
                    start: cursor,
                    end: b.start,
                });
            }
            cursor = cursor.max(b.end);
        }

        if cursor < w.end {
            free.push(TimeWindow {
                start: cursor,
                end: w.end,
            });
        }
    }

    free
}

/// Candidate bookings of `length` laid out every `step` from the start of
/// each free interval, skipping starts before `not_before`.
pub fn candidate_slots(
    free: &[TimeWindow],
    length: Duration,
    step: Duration,
    not_before: DateTime<Utc>,
) -> Vec<TimeWindow> {
    let mut slots = Vec::new();
    if length <= Duration::zero() || step <= Duration::zero() {
        return slots;
    }

    for w in free {
        let mut start = w.start;
        while start + length <= w.end {
            if start >= not_before {
                slots.push(TimeWindow {
                    start,
                    end: start + length,
                });
            }
            start += step;
        }
    }

    slots
}
