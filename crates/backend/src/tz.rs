//! Conversions between UTC instants and the service's fixed local timezone.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

pub const SERVICE_TZ: Tz = chrono_tz::Asia::Tokyo;

/// Local wall-clock time on `date`, as a UTC instant.
pub fn local_to_utc(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let naive = date.and_time(time);
    match SERVICE_TZ.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // Asia/Tokyo has no DST gaps; treat an unmappable time as already UTC.
        None => Utc.from_utc_datetime(&naive),
    }
}

/// `[local 00:00, next local 00:00)` for `date`.
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_to_utc(date, NaiveTime::MIN);
    let end = local_to_utc(date + Duration::days(1), NaiveTime::MIN);
    (start, end)
}

pub fn local_date(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&SERVICE_TZ).date_naive()
}

/// First instant of the local calendar month containing `instant`.
pub fn month_start(instant: DateTime<Utc>) -> DateTime<Utc> {
    let date = local_date(instant);
    let first = date.with_day(1).unwrap_or(date);
    local_to_utc(first, NaiveTime::MIN)
}

/// `YYYY/MM/DD` in local time.
pub fn format_date(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&SERVICE_TZ).format("%Y/%m/%d").to_string()
}

/// `HH:MM` in local time.
pub fn format_time(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&SERVICE_TZ).format("%H:%M").to_string()
}
