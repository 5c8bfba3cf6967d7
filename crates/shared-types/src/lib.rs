use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[cfg(feature = "diesel")]
mod json_wrapper;

#[cfg(feature = "diesel")]
pub use json_wrapper::JsonWrapper;

/// IANA name of the only timezone the service operates in.
pub const SERVICE_TIMEZONE: &str = "Asia/Tokyo";

/// Meeting lengths an event type may be configured with.
pub const ALLOWED_DURATIONS_MINUTES: [i32; 6] = [15, 30, 45, 60, 90, 120];

// ============================================================================
// Intervals
// ============================================================================

/// An occupied interval reported by an external calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BusySlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusySlot {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(start < end, "BusySlot start must be before end");
        Self { start, end }
    }
}

/// A candidate or confirmed bookable interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSlot {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Half-open overlap test; touching intervals do not overlap.
    pub fn overlaps(&self, busy: &BusySlot) -> bool {
        self.start < busy.end && self.end > busy.start
    }
}

// ============================================================================
// Weekly availability
// ============================================================================

/// Day of week with the Sunday = 0 numbering used by stored settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Weekday {
    Sunday = 0,
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Sunday,
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        Self::ALL[day.num_days_from_sunday() as usize]
    }
}

/// `HH:MM` (de)serialization for [`NaiveTime`] fields.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Builds a wall-clock time from hours and minutes (midnight if out of range).
pub fn wall_time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

/// Availability rule for one weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAvailability {
    pub enabled: bool,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    /// Open for the whole local day; `start_time`/`end_time` are ignored.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub all_day: bool,
}

impl DayAvailability {
    pub fn hours(start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            enabled: true,
            start_time,
            end_time,
            all_day: false,
        }
    }

    pub fn all_day() -> Self {
        Self {
            enabled: true,
            start_time: NaiveTime::MIN,
            end_time: NaiveTime::MIN,
            all_day: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            start_time: wall_time(9, 0),
            end_time: wall_time(18, 0),
            all_day: false,
        }
    }
}

/// Seven [`DayAvailability`] rules indexed by [`Weekday`].
///
/// Stored as a JSON object keyed `"0"`..`"6"`; a key missing from stored
/// settings reads back as a disabled day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyAvailability {
    days: [DayAvailability; 7],
}

impl WeeklyAvailability {
    pub fn all_disabled() -> Self {
        Self {
            days: std::array::from_fn(|_| DayAvailability::disabled()),
        }
    }

    pub fn day(&self, weekday: Weekday) -> &DayAvailability {
        &self.days[weekday.index()]
    }

    pub fn set_day(&mut self, weekday: Weekday, day: DayAvailability) {
        self.days[weekday.index()] = day;
    }

    pub fn with_day(mut self, weekday: Weekday, day: DayAvailability) -> Self {
        self.set_day(weekday, day);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (Weekday, &DayAvailability)> {
        Weekday::ALL.into_iter().zip(self.days.iter())
    }
}

impl Default for WeeklyAvailability {
    /// Monday to Friday 09:00-18:00, weekends off.
    fn default() -> Self {
        let mut weekly = Self::all_disabled();
        for weekday in &Weekday::ALL[1..6] {
            weekly.set_day(*weekday, DayAvailability::hours(wall_time(9, 0), wall_time(18, 0)));
        }
        weekly
    }
}

impl Serialize for WeeklyAvailability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let map: BTreeMap<String, &DayAvailability> = self
            .iter()
            .map(|(weekday, day)| (weekday.index().to_string(), day))
            .collect();
        map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WeeklyAvailability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, DayAvailability>::deserialize(deserializer)?;
        let mut weekly = Self::all_disabled();
        for (key, day) in raw {
            let weekday = key
                .parse::<usize>()
                .ok()
                .and_then(Weekday::from_index)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid weekday key: {key}")))?;
            weekly.set_day(weekday, day);
        }
        Ok(weekly)
    }
}

// ============================================================================
// Event type settings
// ============================================================================

/// How the members of an event type take part in a meeting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationMode {
    AllRequired,
    AnyAvailable,
}

impl ParticipationMode {
    pub fn as_str(&self) -> &str {
        match self {
            ParticipationMode::AllRequired => "all_required",
            ParticipationMode::AnyAvailable => "any_available",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "all_required" => Some(ParticipationMode::AllRequired),
            "any_available" => Some(ParticipationMode::AnyAvailable),
            _ => None,
        }
    }
}

/// Named daily windows an event type can be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePreset {
    Morning,
    Afternoon,
    BusinessHours,
}

impl TimePreset {
    pub fn window(&self) -> (NaiveTime, NaiveTime) {
        match self {
            TimePreset::Morning => (wall_time(9, 0), wall_time(12, 0)),
            TimePreset::Afternoon => (wall_time(13, 0), wall_time(18, 0)),
            TimePreset::BusinessHours => (wall_time(9, 0), wall_time(18, 0)),
        }
    }
}

/// Further narrowing of the weekly window for one event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimeRestriction {
    #[default]
    None,
    Preset {
        preset: TimePreset,
    },
    Custom {
        #[serde(with = "hhmm")]
        start: NaiveTime,
        #[serde(with = "hhmm")]
        end: NaiveTime,
    },
}

impl TimeRestriction {
    /// The daily window this restriction allows, if any.
    pub fn window(&self) -> Option<(NaiveTime, NaiveTime)> {
        match self {
            TimeRestriction::None => None,
            TimeRestriction::Preset { preset } => Some(preset.window()),
            TimeRestriction::Custom { start, end } => Some((*start, *end)),
        }
    }
}

// ============================================================================
// Bookings
// ============================================================================

/// Lifecycle state of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Canceled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Canceled => "canceled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(BookingStatus::Confirmed),
            "canceled" => Some(BookingStatus::Canceled),
            _ => None,
        }
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Public booking submission
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub event_type_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[validate(length(min = 1, max = 100), custom = "not_blank")]
    pub name: String,
    #[validate(email, length(max = 254))]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub company_name: Option<String>,
    #[validate(length(min = 1, max = 2000), custom = "not_blank")]
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingSummary {
    pub id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub event_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingResponse {
    pub booking: BookingSummary,
    pub cancel_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meet_link: Option<String>,
}

/// Public cancellation request carrying the single-use token
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CancelBookingRequest {
    pub booking_id: Uuid,
    #[validate(length(min = 1, max = 256))]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelBookingResponse {
    pub success: bool,
}

// ============================================================================
// Availability query
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub days_ahead: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTypeSummary {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub participation_mode: ParticipationMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub slots: Vec<TimeSlot>,
    pub timezone: String,
    pub event_type: EventTypeSummary,
}
