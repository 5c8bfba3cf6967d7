// Database models for Diesel
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use shared_types::{
    BookingStatus, JsonWrapper, ParticipationMode, TimeRestriction, WeeklyAvailability,
};
use uuid::Uuid;

use crate::schema::{bookings, event_types, team_members};

/// A team member whose calendar can take part in bookings
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = team_members)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TeamMember {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub email: String,
    /// Encrypted at rest, see [`crate::crypto::TokenCipher`]
    pub google_refresh_token: Option<String>,
    pub google_calendar_id: String,
    pub availability_settings: JsonWrapper<WeeklyAvailability>,
    pub is_note_taker: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TeamMember {
    /// Active with a connected calendar.
    pub fn is_bookable(&self) -> bool {
        self.is_active && self.google_refresh_token.is_some()
    }
}

/// Database representation of event_types
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = event_types)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EventTypeRow {
    pub id: Uuid,
    pub team_id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub participation_mode: String,
    pub time_restriction: JsonWrapper<TimeRestriction>, // JSON stored as TEXT
    pub calendar_title_template: String,
    pub include_note_takers: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EventType {
    pub id: Uuid,
    pub team_id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
    pub participation_mode: ParticipationMode,
    pub time_restriction: TimeRestriction,
    pub calendar_title_template: String,
    pub include_note_takers: bool,
    pub is_active: bool,
}

impl TryFrom<EventTypeRow> for EventType {
    type Error = anyhow::Error;

    fn try_from(row: EventTypeRow) -> Result<Self, Self::Error> {
        let participation_mode = ParticipationMode::from_str(&row.participation_mode)
            .ok_or_else(|| anyhow!("Unknown participation mode: {}", row.participation_mode))?;

        Ok(EventType {
            id: row.id,
            team_id: row.team_id,
            organizer_id: row.organizer_id,
            title: row.title,
            description: row.description,
            duration_minutes: row.duration_minutes,
            participation_mode,
            time_restriction: row.time_restriction.into_inner(),
            calendar_title_template: row.calendar_title_template,
            include_note_takers: row.include_note_takers,
            is_active: row.is_active,
        })
    }
}

/// Database representation of bookings
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BookingRow {
    pub id: Uuid,
    pub event_type_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub requester_name: String,
    pub requester_email: String,
    pub requester_company: Option<String>,
    pub note: String,
    pub google_event_id: String,
    pub guest_event_id: Option<String>,
    pub meet_link: Option<String>,
    pub cancel_token_hash: Option<String>,
    pub status: String,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Booking {
    pub id: Uuid,
    pub event_type_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub requester_name: String,
    pub requester_email: String,
    pub requester_company: Option<String>,
    pub note: String,
    pub google_event_id: String,
    pub guest_event_id: Option<String>,
    pub meet_link: Option<String>,
    pub cancel_token_hash: Option<String>,
    pub status: BookingStatus,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = anyhow::Error;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = BookingStatus::from_str(&row.status)
            .ok_or_else(|| anyhow!("Unknown booking status: {}", row.status))?;

        Ok(Booking {
            id: row.id,
            event_type_id: row.event_type_id,
            start_at: row.start_at,
            end_at: row.end_at,
            requester_name: row.requester_name,
            requester_email: row.requester_email,
            requester_company: row.requester_company,
            note: row.note,
            google_event_id: row.google_event_id,
            guest_event_id: row.guest_event_id,
            meet_link: row.meet_link,
            cancel_token_hash: row.cancel_token_hash,
            status,
            canceled_at: row.canceled_at,
            created_at: row.created_at,
        })
    }
}

/// Insert model for bookings; new rows are always confirmed
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bookings)]
pub struct NewBooking {
    pub event_type_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub requester_name: String,
    pub requester_email: String,
    pub requester_company: Option<String>,
    pub note: String,
    pub google_event_id: String,
    pub guest_event_id: Option<String>,
    pub meet_link: Option<String>,
    pub cancel_token_hash: Option<String>,
    pub status: String,
}

/// Value of the `maintenance_mode` app setting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceMode {
    pub enabled: bool,
    #[serde(default)]
    pub message: String,
}

impl MaintenanceMode {
    pub const KEY: &'static str = "maintenance_mode";
}
