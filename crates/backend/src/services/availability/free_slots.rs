use chrono::{DateTime, Utc};
use shared_types::{BusySlot, TimeSlot};

/// Subtract sorted, merged busy intervals from `[range_start, range_end)`.
///
/// Callers pass only the busy intervals that overlap the range.
pub fn free_slots(
    merged_busy: &[BusySlot],
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
) -> Vec<TimeSlot> {
    let mut free = Vec::new();
    let mut cursor = range_start;

    for busy in merged_busy {
        if cursor >= range_end {
            break;
        }
        if busy.start > cursor {
            let end = busy.start.min(range_end);
            if end > cursor {
                free.push(TimeSlot::new(cursor, end));
            }
        }
        cursor = cursor.max(busy.end);
    }

    if cursor < range_end {
        free.push(TimeSlot::new(cursor, range_end));
    }

    free
}
