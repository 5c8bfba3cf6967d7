//! Availability engine: merges busy time, windows it against working
//! hours and cuts the remainder into bookable slots.

mod free_slots;
mod merge;
mod quantize;
mod working_hours;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use shared_types::{BusySlot, TimeSlot, WeeklyAvailability};

pub use free_slots::free_slots;
pub use merge::merge_busy;
pub use quantize::quantize;
pub use working_hours::{effective_weekly, resolve, WorkingWindow};

pub const DEFAULT_MIN_NOTICE_MINUTES: i64 = 60;

/// Inclusive range of local calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// `days` consecutive days beginning at `start`.
    pub fn days_from(start: NaiveDate, days: u32) -> Self {
        let span = i64::from(days.max(1)) - 1;
        Self::new(start, start + Duration::days(span))
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }
}

#[derive(Debug, Clone)]
pub struct AvailabilityOptions<'a> {
    pub weekly: &'a WeeklyAvailability,
    pub min_notice_minutes: i64,
}

impl<'a> AvailabilityOptions<'a> {
    pub fn new(weekly: &'a WeeklyAvailability) -> Self {
        Self {
            weekly,
            min_notice_minutes: DEFAULT_MIN_NOTICE_MINUTES,
        }
    }
}

/// Compute bookable slots across `range`, in chronological order.
///
/// No slot starts before `now + min_notice_minutes`; the floor is applied
/// by clamping each day's window rather than filtering afterwards.
pub fn calculate(
    busy_arrays: &[Vec<BusySlot>],
    range: DateRange,
    duration_minutes: i64,
    options: &AvailabilityOptions<'_>,
    now: DateTime<Utc>,
) -> Vec<TimeSlot> {
    let merged = merge_busy(busy_arrays);
    let min_booking_time = now + Duration::minutes(options.min_notice_minutes);
    let mut slots = Vec::new();

    for day in range.days() {
        let Some(window) = resolve(day, options.weekly) else {
            continue;
        };

        let effective_start = window.start.max(min_booking_time);
        if effective_start >= window.end {
            continue;
        }

        let overlapping = overlapping(&merged, effective_start, window.end);
        for free in free_slots(overlapping, effective_start, window.end) {
            slots.extend(quantize(&free, duration_minutes));
        }
    }

    slots
}

/// Sub-slice of sorted, disjoint `merged` intervals overlapping `[start, end)`.
fn overlapping(merged: &[BusySlot], start: DateTime<Utc>, end: DateTime<Utc>) -> &[BusySlot] {
    // merged intervals are disjoint, so their ends are sorted too
    let first = merged.partition_point(|busy| busy.end <= start);
    let last = first + merged[first..].partition_point(|busy| busy.start < end);
    &merged[first..last]
}

/// `false` when `candidate` overlaps any busy interval of any calendar.
pub fn is_slot_available(candidate: &TimeSlot, busy_arrays: &[Vec<BusySlot>]) -> bool {
    !merge_busy(busy_arrays)
        .iter()
        .any(|busy| candidate.overlaps(busy))
}
