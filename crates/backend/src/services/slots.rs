use shared_types::{
    AvailabilityResponse, EventTypeSummary, ParticipationMode, SERVICE_TIMEZONE,
};
use uuid::Uuid;

use super::availability::{self, AvailabilityOptions, DateRange};
use super::busy::{fetch_busy, successful_busy};
use super::BookingService;
use crate::error::ApiResult;
use crate::tz;

impl BookingService {
    /// Bookable slots of an event type from today (Tokyo) for `days_ahead`
    /// days.
    pub async fn availability(
        &self,
        event_type_id: Uuid,
        days_ahead: Option<u32>,
    ) -> ApiResult<AvailabilityResponse> {
        let event_type = self.active_event_type(event_type_id).await?;
        let participants = self.participants(&event_type).await?;

        let days = days_ahead
            .unwrap_or(self.config.default_days_ahead)
            .clamp(1, self.config.max_days_ahead.max(1));
        let now = self.clock.now();
        let range = DateRange::days_from(tz::local_date(now), days);
        let (time_min, _) = tz::day_bounds(range.start);
        let (_, time_max) = tz::day_bounds(range.end);

        if event_type.participation_mode == ParticipationMode::AnyAvailable {
            tracing::debug!(
                event_type_id = %event_type.id,
                "any_available is evaluated with all-required semantics"
            );
        }

        let results = fetch_busy(
            self.calendar.as_ref(),
            &participants.required,
            time_min,
            time_max,
        )
        .await;
        let busy = successful_busy(&results);

        let weekly = availability::effective_weekly(
            participants
                .required
                .iter()
                .map(|member| &*member.availability_settings),
            &event_type.time_restriction,
        );
        let options = AvailabilityOptions {
            min_notice_minutes: self.config.min_notice_minutes,
            ..AvailabilityOptions::new(&weekly)
        };

        let slots = availability::calculate(
            &busy,
            range,
            i64::from(event_type.duration_minutes),
            &options,
            now,
        );

        tracing::debug!(
            event_type_id = %event_type.id,
            members = participants.required.len(),
            days,
            slots = slots.len(),
            "Computed availability"
        );

        Ok(AvailabilityResponse {
            slots,
            timezone: SERVICE_TIMEZONE.to_string(),
            event_type: EventTypeSummary {
                id: event_type.id,
                title: event_type.title,
                description: event_type.description,
                duration_minutes: event_type.duration_minutes,
                participation_mode: event_type.participation_mode,
            },
        })
    }
}
