//! In-memory store and calendar used by the service tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_types::{
    BookingStatus, BusySlot, JsonWrapper, ParticipationMode, TimeRestriction, WeeklyAvailability,
};
use uuid::Uuid;

use crate::google::{CalendarProvider, CreatedEvent, NewCalendarEvent};
use crate::models::{Booking, EventType, MaintenanceMode, NewBooking, TeamMember};
use crate::repository::Store;

pub fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

/// Active member with a connected calendar whose id is its email.
pub fn member(email: &str) -> TeamMember {
    TeamMember {
        id: Uuid::new_v4(),
        team_id: Uuid::nil(),
        name: email.split('@').next().unwrap_or(email).to_string(),
        email: email.to_string(),
        google_refresh_token: Some(format!("enc:{}", email)),
        google_calendar_id: email.to_string(),
        availability_settings: JsonWrapper::new(WeeklyAvailability::default()),
        is_note_taker: false,
        is_active: true,
        created_at: utc("2026-01-01T00:00:00Z"),
        updated_at: utc("2026-01-01T00:00:00Z"),
    }
}

pub fn event_type(organizer: &TeamMember, duration_minutes: i32) -> EventType {
    EventType {
        id: Uuid::new_v4(),
        team_id: organizer.team_id,
        organizer_id: organizer.id,
        title: "初回相談".to_string(),
        description: Some("30分のオンライン相談".to_string()),
        duration_minutes,
        participation_mode: ParticipationMode::AllRequired,
        time_restriction: TimeRestriction::None,
        calendar_title_template: "{イベント名} - {名前}".to_string(),
        include_note_takers: false,
        is_active: true,
    }
}

#[derive(Default)]
struct StoreState {
    members: HashMap<Uuid, TeamMember>,
    event_types: HashMap<Uuid, EventType>,
    assignments: HashMap<Uuid, Vec<Uuid>>,
    bookings: HashMap<Uuid, Booking>,
    usage: Vec<(String, i32)>,
    maintenance: MaintenanceMode,
    fail_inserts: bool,
}

/// Store fake. Usage totals ignore the `since` bound.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn add_member(&self, member: TeamMember) {
        self.state.lock().unwrap().members.insert(member.id, member);
    }

    pub fn add_event_type(&self, event_type: EventType, member_ids: Vec<Uuid>) {
        let mut state = self.state.lock().unwrap();
        state.assignments.insert(event_type.id, member_ids);
        state.event_types.insert(event_type.id, event_type);
    }

    pub fn set_maintenance(&self, message: &str) {
        self.state.lock().unwrap().maintenance = MaintenanceMode {
            enabled: true,
            message: message.to_string(),
        };
    }

    pub fn fail_inserts(&self) {
        self.state.lock().unwrap().fail_inserts = true;
    }

    pub fn bookings(&self) -> Vec<Booking> {
        self.state.lock().unwrap().bookings.values().cloned().collect()
    }

    pub fn usage(&self) -> Vec<(String, i32)> {
        self.state.lock().unwrap().usage.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn event_type(&self, id: Uuid) -> Result<Option<EventType>> {
        Ok(self.state.lock().unwrap().event_types.get(&id).cloned())
    }

    async fn event_type_member_ids(&self, event_type_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .assignments
            .get(&event_type_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn member(&self, id: Uuid) -> Result<Option<TeamMember>> {
        Ok(self.state.lock().unwrap().members.get(&id).cloned())
    }

    async fn members(&self, ids: &[Uuid]) -> Result<Vec<TeamMember>> {
        let state = self.state.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| state.members.get(id).cloned())
            .collect())
    }

    async fn note_takers(&self, team_id: Uuid) -> Result<Vec<TeamMember>> {
        let state = self.state.lock().unwrap();
        let mut found: Vec<TeamMember> = state
            .members
            .values()
            .filter(|m| m.team_id == team_id && m.is_note_taker && m.is_active)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(found)
    }

    async fn booking(&self, id: Uuid) -> Result<Option<Booking>> {
        Ok(self.state.lock().unwrap().bookings.get(&id).cloned())
    }

    async fn insert_booking(&self, new: NewBooking) -> Result<Booking> {
        let mut state = self.state.lock().unwrap();
        if state.fail_inserts {
            bail!("insert failed");
        }

        let booking = Booking {
            id: Uuid::new_v4(),
            event_type_id: new.event_type_id,
            start_at: new.start_at,
            end_at: new.end_at,
            requester_name: new.requester_name,
            requester_email: new.requester_email,
            requester_company: new.requester_company,
            note: new.note,
            google_event_id: new.google_event_id,
            guest_event_id: new.guest_event_id,
            meet_link: new.meet_link,
            cancel_token_hash: new.cancel_token_hash,
            status: BookingStatus::from_str(&new.status)
                .ok_or_else(|| anyhow!("bad status {}", new.status))?,
            canceled_at: None,
            created_at: Utc::now(),
        };
        state.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn mark_booking_canceled(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        match state.bookings.get_mut(&id) {
            Some(b) if b.status == BookingStatus::Confirmed && b.cancel_token_hash.is_some() => {
                b.status = BookingStatus::Canceled;
                b.cancel_token_hash = None;
                b.canceled_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn log_usage(&self, endpoint: &str, request_count: i32) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .usage
            .push((endpoint.to_string(), request_count));
        Ok(())
    }

    async fn usage_since(&self, _since: DateTime<Utc>) -> Result<i64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .usage
            .iter()
            .map(|(_, count)| i64::from(*count))
            .sum())
    }

    async fn maintenance_mode(&self) -> Result<MaintenanceMode> {
        Ok(self.state.lock().unwrap().maintenance.clone())
    }
}

#[derive(Default)]
struct CalendarState {
    busy: HashMap<String, Vec<BusySlot>>,
    failing_refresh: HashSet<String>,
    failing_busy: HashSet<String>,
    fail_guest_events: bool,
    fail_deletes: bool,
    created: Vec<(String, NewCalendarEvent, String)>,
    deleted: Vec<String>,
    calls: usize,
}

/// Calendar fake. Access tokens are `access:<refresh token>`; created events
/// get ids `evt-<n>` and those requesting Meet get a link.
#[derive(Default)]
pub struct FakeCalendar {
    state: Mutex<CalendarState>,
}

impl FakeCalendar {
    pub fn add_busy(&self, calendar_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.state
            .lock()
            .unwrap()
            .busy
            .entry(calendar_id.to_string())
            .or_default()
            .push(BusySlot::new(start, end));
    }

    pub fn fail_refresh_for(&self, refresh_token: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_refresh
            .insert(refresh_token.to_string());
    }

    pub fn fail_busy_for(&self, calendar_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_busy
            .insert(calendar_id.to_string());
    }

    pub fn fail_guest_events(&self) {
        self.state.lock().unwrap().fail_guest_events = true;
    }

    pub fn fail_deletes(&self) {
        self.state.lock().unwrap().fail_deletes = true;
    }

    /// `(calendar id, event, event id)` for every created event
    pub fn created(&self) -> Vec<(String, NewCalendarEvent, String)> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }
}

#[async_trait]
impl CalendarProvider for FakeCalendar {
    async fn refresh_access_token(&self, encrypted_refresh_token: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.failing_refresh.contains(encrypted_refresh_token) {
            bail!("invalid_grant");
        }
        Ok(format!("access:{}", encrypted_refresh_token))
    }

    async fn busy_intervals(
        &self,
        _access_token: &str,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<BusySlot>> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.failing_busy.contains(calendar_id) {
            bail!("calendar unavailable");
        }
        Ok(state
            .busy
            .get(calendar_id)
            .map(|slots| {
                slots
                    .iter()
                    .filter(|b| b.start < time_max && b.end > time_min)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_event(
        &self,
        _access_token: &str,
        calendar_id: &str,
        event: &NewCalendarEvent,
    ) -> Result<CreatedEvent> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if !event.add_meet_link && state.fail_guest_events {
            bail!("guest event rejected");
        }

        let event_id = format!("evt-{}", state.created.len() + 1);
        state
            .created
            .push((calendar_id.to_string(), event.clone(), event_id.clone()));

        Ok(CreatedEvent {
            meet_link: event
                .add_meet_link
                .then(|| format!("https://meet.google.com/{}", event_id)),
            event_id,
        })
    }

    async fn delete_event(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        event_id: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.fail_deletes {
            bail!("delete failed");
        }
        state.deleted.push(event_id.to_string());
        Ok(())
    }
}
