//! Booking commit protocol.
//!
//! validate, rate limit, maintenance check, resolve participants, re-fetch
//! live busy time, re-check the slot, create the calendar events, persist,
//! log usage. Nothing is written to a calendar until the slot re-check
//! passes.

use anyhow::anyhow;
use chrono::Duration;
use shared_types::{
    BookingStatus, BookingSummary, CreateBookingRequest, CreateBookingResponse, TimeSlot,
};
use validator::Validate;

use super::availability::{effective_weekly, is_slot_available, resolve};
use super::busy::{fetch_busy, successful_busy};
use super::title_template::{self, TitleContext};
use super::{cancel_token, BookingService, Participants, CREATE_ENDPOINT};
use crate::error::{ApiError, ApiResult};
use crate::google::{CreatedEvent, NewCalendarEvent};
use crate::models::{EventType, NewBooking};
use crate::tz;

const DEFAULT_MAINTENANCE_MESSAGE: &str = "現在メンテナンス中です。しばらくしてから再度お試しください。";
const SLOT_TAKEN_MESSAGE: &str =
    "選択された時間は既に予約されています。別の時間を選択してください。";

impl BookingService {
    pub async fn create_booking(
        &self,
        client_ip: &str,
        request: CreateBookingRequest,
    ) -> ApiResult<CreateBookingResponse> {
        request.validate()?;
        if request.end_at <= request.start_at {
            return Err(ApiError::invalid_field(
                "endAt",
                "終了時刻は開始時刻より後である必要があります",
            ));
        }

        self.rate_limiter.check(client_ip, self.store.as_ref()).await?;

        let maintenance = self.store.maintenance_mode().await?;
        if maintenance.enabled {
            let message = if maintenance.message.trim().is_empty() {
                DEFAULT_MAINTENANCE_MESSAGE.to_string()
            } else {
                maintenance.message
            };
            return Err(ApiError::ServiceUnavailable(message));
        }

        let event_type = self.active_event_type(request.event_type_id).await?;
        let participants = self.participants(&event_type).await?;

        if request.end_at - request.start_at
            != Duration::minutes(i64::from(event_type.duration_minutes))
        {
            return Err(ApiError::invalid_field(
                "endAt",
                "予約時間がイベントの所要時間と一致しません",
            ));
        }
        let earliest = self.clock.now() + Duration::minutes(self.config.min_notice_minutes);
        if request.start_at < earliest {
            return Err(ApiError::invalid_field(
                "startAt",
                "この時間は予約受付期限を過ぎています",
            ));
        }
        if !within_working_hours(&event_type, &participants, &request) {
            return Err(ApiError::invalid_field(
                "startAt",
                "この時間は予約を受け付けていません",
            ));
        }

        // Live re-check against every required calendar
        let results = fetch_busy(
            self.calendar.as_ref(),
            &participants.required,
            request.start_at,
            request.end_at,
        )
        .await;

        let organizer_token = results
            .iter()
            .find(|r| r.member_id == participants.organizer.id)
            .and_then(|r| r.access_token.clone())
            .ok_or_else(|| {
                anyhow!(
                    "Failed to refresh access token for organizer {}",
                    participants.organizer.id
                )
            })?;

        let slot = TimeSlot::new(request.start_at, request.end_at);
        if !is_slot_available(&slot, &successful_busy(&results)) {
            tracing::info!(
                event_type_id = %event_type.id,
                start = %request.start_at,
                "Slot no longer available at commit time"
            );
            return Err(ApiError::conflict(SLOT_TAKEN_MESSAGE));
        }

        let internal = self
            .calendar
            .create_event(
                &organizer_token,
                &participants.organizer.google_calendar_id,
                &internal_event(&event_type, &participants, &request),
            )
            .await?;

        let guest = self
            .create_guest_event(&organizer_token, &event_type, &participants, &request, &internal)
            .await;

        let token = cancel_token::generate();
        let new_booking = NewBooking {
            event_type_id: event_type.id,
            start_at: request.start_at,
            end_at: request.end_at,
            requester_name: request.name.trim().to_string(),
            requester_email: request.email.trim().to_string(),
            requester_company: company(&request).map(str::to_string),
            note: request.note.clone(),
            google_event_id: internal.event_id.clone(),
            guest_event_id: guest.as_ref().map(|g| g.event_id.clone()),
            meet_link: internal.meet_link.clone(),
            cancel_token_hash: Some(cancel_token::hash(&token)),
            status: BookingStatus::Confirmed.as_str().to_string(),
        };

        let booking = match self.store.insert_booking(new_booking).await {
            Ok(booking) => booking,
            Err(e) => {
                tracing::error!(
                    event_id = %internal.event_id,
                    guest_event_id = ?guest.as_ref().map(|g| &g.event_id),
                    "Booking insert failed after calendar events were created: {:#}",
                    e
                );
                self.compensate(&organizer_token, &participants, &internal, guest.as_ref())
                    .await;
                return Err(ApiError::Internal(e));
            }
        };

        let calls = i32::try_from(participants.required.len() + 1).unwrap_or(i32::MAX);
        self.record_usage(CREATE_ENDPOINT, calls).await;

        tracing::info!(
            booking_id = %booking.id,
            event_type_id = %event_type.id,
            event_id = %internal.event_id,
            "Booking confirmed"
        );

        Ok(CreateBookingResponse {
            booking: BookingSummary {
                id: booking.id,
                start_at: booking.start_at,
                end_at: booking.end_at,
                event_title: event_type.title,
            },
            cancel_url: format!(
                "{}/cancel?bookingId={}&token={}",
                self.public_base_url,
                booking.id,
                urlencoding::encode(&token)
            ),
            meet_link: internal.meet_link,
        })
    }

    /// Requester-facing copy of the meeting. Failures are logged and
    /// swallowed.
    async fn create_guest_event(
        &self,
        access_token: &str,
        event_type: &EventType,
        participants: &Participants,
        request: &CreateBookingRequest,
        internal: &CreatedEvent,
    ) -> Option<CreatedEvent> {
        let event = NewCalendarEvent {
            summary: event_type.title.clone(),
            description: internal.meet_link.clone(),
            start: request.start_at,
            end: request.end_at,
            attendees: vec![request.email.trim().to_string()],
            organizer_email: participants.organizer.email.clone(),
            add_meet_link: false,
        };

        match self
            .calendar
            .create_event(
                access_token,
                &participants.organizer.google_calendar_id,
                &event,
            )
            .await
        {
            Ok(created) => Some(created),
            Err(e) => {
                tracing::warn!(
                    event_type_id = %event_type.id,
                    event_id = %internal.event_id,
                    "Failed to create guest event: {:#}",
                    e
                );
                None
            }
        }
    }

    /// Best-effort removal of events whose booking row was never written.
    async fn compensate(
        &self,
        access_token: &str,
        participants: &Participants,
        internal: &CreatedEvent,
        guest: Option<&CreatedEvent>,
    ) {
        let calendar_id = &participants.organizer.google_calendar_id;
        for event in std::iter::once(internal).chain(guest) {
            if let Err(e) = self
                .calendar
                .delete_event(access_token, calendar_id, &event.event_id)
                .await
            {
                tracing::error!(
                    event_id = %event.event_id,
                    "Orphaned calendar event could not be removed: {:#}",
                    e
                );
            }
        }
    }
}

fn company(request: &CreateBookingRequest) -> Option<&str> {
    request
        .company_name
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
}

/// The requested slot must sit inside the working window shared by the
/// required members, after the event type's time restriction.
fn within_working_hours(
    event_type: &EventType,
    participants: &Participants,
    request: &CreateBookingRequest,
) -> bool {
    let weekly = effective_weekly(
        participants
            .required
            .iter()
            .map(|member| &*member.availability_settings),
        &event_type.time_restriction,
    );
    match resolve(tz::local_date(request.start_at), &weekly) {
        Some(window) => window.start <= request.start_at && request.end_at <= window.end,
        None => false,
    }
}

fn internal_event(
    event_type: &EventType,
    participants: &Participants,
    request: &CreateBookingRequest,
) -> NewCalendarEvent {
    let name = request.name.trim();
    let email = request.email.trim();

    let summary = title_template::render(
        &event_type.calendar_title_template,
        &TitleContext {
            requester_name: name,
            requester_email: email,
            company_name: company(request),
            event_title: &event_type.title,
            start: request.start_at,
            end: request.end_at,
            note: &request.note,
        },
    );

    let mut description = format!("お名前: {}\nメール: {}\n", name, email);
    if let Some(company) = company(request) {
        description.push_str(&format!("会社名: {}\n", company));
    }
    description.push_str(&format!("\n{}", request.note));

    NewCalendarEvent {
        summary,
        description: Some(description),
        start: request.start_at,
        end: request.end_at,
        attendees: participants.attendee_emails(),
        organizer_email: participants.organizer.email.clone(),
        add_meet_link: true,
    }
}
