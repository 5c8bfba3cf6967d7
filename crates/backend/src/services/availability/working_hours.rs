use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use shared_types::{DayAvailability, TimeRestriction, Weekday, WeeklyAvailability};

use crate::tz;

/// Bookable bounds of one local day, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Resolve the working window of `date`, or `None` when the day is off.
///
/// Inverted `HH:MM` bounds are passed through; they simply produce no
/// free time downstream.
pub fn resolve(date: NaiveDate, weekly: &WeeklyAvailability) -> Option<WorkingWindow> {
    let rule = weekly.day(Weekday::from(date.weekday()));
    if !rule.enabled {
        return None;
    }

    if rule.all_day {
        let (start, end) = tz::day_bounds(date);
        return Some(WorkingWindow { start, end });
    }

    Some(WorkingWindow {
        start: tz::local_to_utc(date, rule.start_time),
        end: tz::local_to_utc(date, rule.end_time),
    })
}

/// The part of the day both rules allow.
fn intersect_day(a: &DayAvailability, b: &DayAvailability) -> DayAvailability {
    if !a.enabled || !b.enabled {
        return DayAvailability::disabled();
    }

    match (a.all_day, b.all_day) {
        (true, true) => DayAvailability::all_day(),
        (true, false) => b.clone(),
        (false, true) => a.clone(),
        (false, false) => {
            let start = a.start_time.max(b.start_time);
            let end = a.end_time.min(b.end_time);
            if start >= end {
                DayAvailability::disabled()
            } else {
                DayAvailability::hours(start, end)
            }
        }
    }
}

fn intersect_weekly(a: &WeeklyAvailability, b: &WeeklyAvailability) -> WeeklyAvailability {
    let mut combined = WeeklyAvailability::all_disabled();
    for weekday in Weekday::ALL {
        combined.set_day(weekday, intersect_day(a.day(weekday), b.day(weekday)));
    }
    combined
}

fn restrict(weekly: &WeeklyAvailability, start: NaiveTime, end: NaiveTime) -> WeeklyAvailability {
    let window = DayAvailability::hours(start, end);
    let mut restricted = WeeklyAvailability::all_disabled();
    for (weekday, day) in weekly.iter() {
        restricted.set_day(weekday, intersect_day(day, &window));
    }
    restricted
}

/// Weekly window shared by every required member, narrowed by the event
/// type's time restriction.
pub fn effective_weekly<'a>(
    member_settings: impl IntoIterator<Item = &'a WeeklyAvailability>,
    restriction: &TimeRestriction,
) -> WeeklyAvailability {
    let combined = member_settings
        .into_iter()
        .fold(None::<WeeklyAvailability>, |acc, settings| match acc {
            None => Some(settings.clone()),
            Some(acc) => Some(intersect_weekly(&acc, settings)),
        })
        .unwrap_or_default();

    match restriction.window() {
        Some((start, end)) => restrict(&combined, start, end),
        None => combined,
    }
}
