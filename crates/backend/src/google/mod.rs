//! Google Calendar integration.
//!
//! The rest of the backend talks to calendars only through
//! [`CalendarProvider`], so the booking protocol can be exercised against an
//! in-memory calendar in tests.

mod calendar;
mod oauth;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_types::BusySlot;

pub use calendar::GoogleCalendarClient;

/// Event to be created on the organizer's calendar
#[derive(Debug, Clone, PartialEq)]
pub struct NewCalendarEvent {
    pub summary: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub attendees: Vec<String>,
    pub organizer_email: String,
    /// Ask Google to attach a Meet conference to the event
    pub add_meet_link: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEvent {
    pub event_id: String,
    pub meet_link: Option<String>,
}

#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Exchange a member's stored (encrypted) refresh token for an access token.
    async fn refresh_access_token(&self, encrypted_refresh_token: &str) -> anyhow::Result<String>;

    /// Busy intervals on `calendar_id` between `time_min` and `time_max`.
    async fn busy_intervals(
        &self,
        access_token: &str,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> anyhow::Result<Vec<BusySlot>>;

    async fn create_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &NewCalendarEvent,
    ) -> anyhow::Result<CreatedEvent>;

    async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> anyhow::Result<()>;
}
