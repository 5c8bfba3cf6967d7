//! Business logic behind the public booking API.
//!
//! [`BookingService`] owns its collaborators behind traits so the protocols
//! can run against in-memory fakes in tests.

pub mod availability;
pub mod busy;
pub mod cancel_token;
pub mod rate_limit;
pub mod title_template;

mod booking;
mod cancellation;
mod slots;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use uuid::Uuid;

use crate::clock::Clock;
use crate::config::BookingConfig;
use crate::error::{ApiError, ApiResult};
use crate::google::CalendarProvider;
use crate::models::{EventType, TeamMember};
use crate::repository::Store;
use rate_limit::RateLimiter;

pub const CREATE_ENDPOINT: &str = "bookings/create";
pub const CANCEL_ENDPOINT: &str = "bookings/cancel";

pub struct BookingService {
    store: Arc<dyn Store>,
    calendar: Arc<dyn CalendarProvider>,
    rate_limiter: RateLimiter,
    clock: Arc<dyn Clock>,
    config: BookingConfig,
    public_base_url: String,
}

/// Calendars taking part in a booking
#[derive(Debug, Clone)]
pub(crate) struct Participants {
    pub organizer: TeamMember,
    /// Organizer first, then assigned members; all bookable
    pub required: Vec<TeamMember>,
    /// Invited only, never checked for conflicts
    pub note_takers: Vec<TeamMember>,
}

impl Participants {
    /// Attendee emails: required members, then note-takers, deduplicated.
    pub fn attendee_emails(&self) -> Vec<String> {
        let mut emails: Vec<String> = Vec::new();
        for member in self.required.iter().chain(self.note_takers.iter()) {
            if !emails.iter().any(|e| e.eq_ignore_ascii_case(&member.email)) {
                emails.push(member.email.clone());
            }
        }
        emails
    }
}

impl BookingService {
    pub fn new(
        store: Arc<dyn Store>,
        calendar: Arc<dyn CalendarProvider>,
        rate_limiter: RateLimiter,
        clock: Arc<dyn Clock>,
        config: BookingConfig,
        public_base_url: String,
    ) -> Self {
        Self {
            store,
            calendar,
            rate_limiter,
            clock,
            config,
            public_base_url,
        }
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Active event type, or not found.
    async fn active_event_type(&self, id: Uuid) -> ApiResult<EventType> {
        match self.store.event_type(id).await? {
            Some(event_type) if event_type.is_active => Ok(event_type),
            _ => Err(ApiError::not_found("イベントタイプ")),
        }
    }

    /// Resolve organizer, required members and note-takers of an event type.
    ///
    /// Members that are inactive or have no connected calendar are dropped;
    /// the organizer must not be.
    async fn participants(&self, event_type: &EventType) -> ApiResult<Participants> {
        let organizer = match self.store.member(event_type.organizer_id).await? {
            Some(member) if member.is_bookable() => member,
            Some(_) => {
                tracing::warn!(
                    event_type_id = %event_type.id,
                    organizer_id = %event_type.organizer_id,
                    "Organizer is inactive or has no connected calendar"
                );
                return Err(ApiError::not_found("主催者のカレンダー"));
            }
            None => return Err(ApiError::not_found("主催者")),
        };

        let mut ids = vec![organizer.id];
        for id in self.store.event_type_member_ids(event_type.id).await? {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        let mut members = self.store.members(&ids[1..]).await?;
        members.retain(TeamMember::is_bookable);
        // keep assignment order
        members.sort_by_key(|m| ids.iter().position(|id| *id == m.id));

        let mut required = Vec::with_capacity(members.len() + 1);
        required.push(organizer.clone());
        required.extend(members);

        let note_takers = if event_type.include_note_takers {
            self.store.note_takers(event_type.team_id).await?
        } else {
            Vec::new()
        };

        Ok(Participants {
            organizer,
            required,
            note_takers,
        })
    }

    /// Append a usage row and invalidate the cached monthly total. Failures
    /// are logged; the request has already succeeded.
    async fn record_usage(&self, endpoint: &str, request_count: i32) {
        if let Err(e) = self.store.log_usage(endpoint, request_count).await {
            tracing::warn!(endpoint, request_count, "Failed to log API usage: {:#}", e);
        }
        self.rate_limiter.invalidate_usage_cache();
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{event_type, member, MemoryStore};
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::RateLimitConfig;
    use crate::services::testing::{utc, FakeCalendar};

    fn service(store: Arc<MemoryStore>) -> BookingService {
        let clock = Arc::new(ManualClock::new(utc("2026-10-19T00:00:00Z")));
        BookingService::new(
            store,
            Arc::new(FakeCalendar::default()),
            RateLimiter::new(RateLimitConfig::default(), clock.clone()),
            clock,
            BookingConfig::default(),
            "https://book.example.com".to_string(),
        )
    }

    #[tokio::test]
    async fn test_participants_dedupe_and_filter() {
        let store = Arc::new(MemoryStore::default());
        let organizer = member("owner@example.com");
        let a = member("a@example.com");
        let mut inactive = member("inactive@example.com");
        inactive.is_active = false;
        let mut unconnected = member("unconnected@example.com");
        unconnected.google_refresh_token = None;
        let mut note_taker = member("notes@example.com");
        note_taker.is_note_taker = true;

        for m in [&organizer, &a, &inactive, &unconnected, &note_taker] {
            store.add_member(m.clone());
        }
        let mut et = event_type(&organizer, 30);
        et.include_note_takers = true;
        store.add_event_type(
            et.clone(),
            vec![a.id, organizer.id, inactive.id, unconnected.id, a.id],
        );

        let participants = service(store).participants(&et).await.unwrap();
        let required: Vec<_> = participants.required.iter().map(|m| m.id).collect();
        assert_eq!(required, vec![organizer.id, a.id]);
        assert_eq!(participants.note_takers.len(), 1);
        assert_eq!(
            participants.attendee_emails(),
            vec![
                "owner@example.com".to_string(),
                "a@example.com".to_string(),
                "notes@example.com".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_unconnected_organizer_is_not_found() {
        let store = Arc::new(MemoryStore::default());
        let mut organizer = member("owner@example.com");
        organizer.google_refresh_token = None;
        store.add_member(organizer.clone());
        let et = event_type(&organizer, 30);
        store.add_event_type(et.clone(), vec![]);

        assert!(matches!(
            service(store).participants(&et).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_inactive_event_type_is_not_found() {
        let store = Arc::new(MemoryStore::default());
        let organizer = member("owner@example.com");
        store.add_member(organizer.clone());
        let mut et = event_type(&organizer, 30);
        et.is_active = false;
        store.add_event_type(et.clone(), vec![]);

        let service = service(store);
        assert!(matches!(
            service.active_event_type(et.id).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            service.active_event_type(Uuid::new_v4()).await,
            Err(ApiError::NotFound(_))
        ));
    }
}
