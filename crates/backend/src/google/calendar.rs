use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use google_calendar3::api::{
    ConferenceData, ConferenceSolutionKey, CreateConferenceRequest, Event, EventAttendee,
    EventDateTime,
};
use google_calendar3::hyper_rustls::HttpsConnector;
use google_calendar3::CalendarHub;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use shared_types::{BusySlot, SERVICE_TIMEZONE};
use uuid::Uuid;

use super::{oauth, CalendarProvider, CreatedEvent, NewCalendarEvent};
use crate::crypto::TokenCipher;

const PAGE_SIZE: i32 = 250;

/// Google Calendar backed [`CalendarProvider`].
///
/// Each call builds a hub authorised with the caller's access token; the
/// TLS connector is shared.
pub struct GoogleCalendarClient {
    connector: HttpsConnector<HttpConnector>,
    http: reqwest::Client,
    cipher: TokenCipher,
    client_id: String,
    client_secret: String,
}

impl GoogleCalendarClient {
    pub fn new(client_id: String, client_secret: String, cipher: TokenCipher) -> Result<Self> {
        let connector = google_calendar3::hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .context("Failed to load native TLS roots")?
            .https_or_http()
            .enable_http1()
            .build();

        Ok(Self {
            connector,
            http: reqwest::Client::new(),
            cipher,
            client_id,
            client_secret,
        })
    }

    fn hub(&self, access_token: &str) -> CalendarHub<HttpsConnector<HttpConnector>> {
        let client = Client::builder(TokioExecutor::new()).build(self.connector.clone());
        CalendarHub::new(client, access_token.to_string())
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarClient {
    async fn refresh_access_token(&self, encrypted_refresh_token: &str) -> Result<String> {
        let refresh_token = self
            .cipher
            .decrypt(encrypted_refresh_token)
            .context("Failed to decrypt refresh token")?;

        oauth::refresh_access_token(
            &self.http,
            &self.client_id,
            &self.client_secret,
            &refresh_token,
        )
        .await
    }

    async fn busy_intervals(
        &self,
        access_token: &str,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<BusySlot>> {
        let hub = self.hub(access_token);
        let mut busy = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut call = hub
                .events()
                .list(calendar_id)
                .time_min(time_min)
                .time_max(time_max)
                .single_events(true)
                .order_by("startTime")
                .max_results(PAGE_SIZE);
            if let Some(ref token) = page_token {
                call = call.page_token(token);
            }

            let (_, events) = call.doit().await.context("Failed to list calendar events")?;

            busy.extend(busy_slots_from_events(events.items.as_deref().unwrap_or_default()));

            match events.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(busy)
    }

    async fn create_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &NewCalendarEvent,
    ) -> Result<CreatedEvent> {
        let hub = self.hub(access_token);

        let mut call = hub
            .events()
            .insert(to_google_event(event), calendar_id)
            .send_updates("all");
        if event.add_meet_link {
            call = call.conference_data_version(1);
        }

        let (_, created) = call.doit().await.context("Failed to create calendar event")?;

        let event_id = created
            .id
            .clone()
            .context("Calendar API returned an event without an id")?;

        tracing::info!(event_id = %event_id, "Created calendar event: {}", event.summary);

        Ok(CreatedEvent {
            event_id,
            meet_link: meet_link(&created),
        })
    }

    async fn delete_event(&self, access_token: &str, calendar_id: &str, event_id: &str) -> Result<()> {
        self.hub(access_token)
            .events()
            .delete(calendar_id, event_id)
            .send_updates("all")
            .doit()
            .await
            .context("Failed to delete calendar event")?;

        tracing::info!(event_id = %event_id, "Deleted calendar event");
        Ok(())
    }
}

fn event_time(instant: DateTime<Utc>) -> EventDateTime {
    EventDateTime {
        date_time: Some(instant),
        time_zone: Some(SERVICE_TIMEZONE.to_string()),
        ..Default::default()
    }
}

fn to_google_event(event: &NewCalendarEvent) -> Event {
    // The organizer owns the calendar the event is written to
    let attendees: Vec<EventAttendee> = event
        .attendees
        .iter()
        .filter(|email| !email.eq_ignore_ascii_case(&event.organizer_email))
        .map(|email| EventAttendee {
            email: Some(email.clone()),
            ..Default::default()
        })
        .collect();

    let conference_data = event.add_meet_link.then(|| ConferenceData {
        create_request: Some(CreateConferenceRequest {
            request_id: Some(Uuid::new_v4().to_string()),
            conference_solution_key: Some(ConferenceSolutionKey {
                type_: Some("hangoutsMeet".to_string()),
            }),
            ..Default::default()
        }),
        ..Default::default()
    });

    Event {
        summary: Some(event.summary.clone()),
        description: event.description.clone(),
        start: Some(event_time(event.start)),
        end: Some(event_time(event.end)),
        attendees: if attendees.is_empty() {
            None
        } else {
            Some(attendees)
        },
        conference_data,
        ..Default::default()
    }
}

fn meet_link(event: &Event) -> Option<String> {
    if let Some(ref link) = event.hangout_link {
        return Some(link.clone());
    }

    event
        .conference_data
        .as_ref()?
        .entry_points
        .as_ref()?
        .iter()
        .find(|entry| entry.entry_point_type.as_deref() == Some("video"))
        .and_then(|entry| entry.uri.clone())
}

/// Reduce listed events to busy intervals.
///
/// Cancelled events, events the calendar owner declined, and all-day events
/// (date only, no time) do not block time.
pub(crate) fn busy_slots_from_events(events: &[Event]) -> Vec<BusySlot> {
    events
        .iter()
        .filter(|event| event.status.as_deref() != Some("cancelled"))
        .filter(|event| !declined_by_self(event))
        .filter_map(|event| {
            let start = event.start.as_ref()?.date_time?;
            let end = event.end.as_ref()?.date_time?;
            (start < end).then(|| BusySlot::new(start, end))
        })
        .collect()
}

fn declined_by_self(event: &Event) -> bool {
    event.attendees.as_ref().is_some_and(|attendees| {
        attendees.iter().any(|attendee| {
            attendee.self_ == Some(true) && attendee.response_status.as_deref() == Some("declined")
        })
    })
}
