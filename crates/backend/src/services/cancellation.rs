use shared_types::{BookingStatus, CancelBookingRequest, CancelBookingResponse};
use validator::Validate;

use super::{cancel_token, BookingService, CANCEL_ENDPOINT};
use crate::error::{ApiError, ApiResult};
use crate::models::{Booking, TeamMember};

const ALREADY_CANCELED: &str = "この予約は既にキャンセルされています";
const ALREADY_STARTED: &str = "開始済みの予約はキャンセルできません";
const INVALID_TOKEN: &str = "キャンセル用のリンクが無効です";

impl BookingService {
    /// Cancel a booking with its single-use token.
    pub async fn cancel_booking(
        &self,
        client_ip: &str,
        request: CancelBookingRequest,
    ) -> ApiResult<CancelBookingResponse> {
        request.validate()?;

        self.rate_limiter.check(client_ip, self.store.as_ref()).await?;

        let booking = self
            .store
            .booking(request.booking_id)
            .await?
            .ok_or_else(|| ApiError::not_found("予約"))?;
        let event_type = self
            .store
            .event_type(booking.event_type_id)
            .await?
            .ok_or_else(|| ApiError::not_found("イベントタイプ"))?;
        let organizer = self
            .store
            .member(event_type.organizer_id)
            .await?
            .ok_or_else(|| ApiError::not_found("主催者"))?;

        if booking.status == BookingStatus::Canceled {
            return Err(ApiError::bad_request(ALREADY_CANCELED));
        }
        if booking.start_at <= self.clock.now() {
            return Err(ApiError::bad_request(ALREADY_STARTED));
        }

        let verified = booking
            .cancel_token_hash
            .as_deref()
            .is_some_and(|stored| cancel_token::verify(&request.token, stored));
        if !verified {
            tracing::warn!(booking_id = %booking.id, "Cancel token rejected");
            return Err(ApiError::bad_request(INVALID_TOKEN));
        }

        self.delete_events(&booking, &organizer).await;

        if !self
            .store
            .mark_booking_canceled(booking.id, self.clock.now())
            .await?
        {
            // Lost a race with another cancel of the same booking
            return Err(ApiError::bad_request(ALREADY_CANCELED));
        }

        self.record_usage(CANCEL_ENDPOINT, 1).await;

        tracing::info!(booking_id = %booking.id, "Booking canceled");

        Ok(CancelBookingResponse { success: true })
    }

    /// Remove the booking's calendar events. Every failure is logged and
    /// ignored; the booking is canceled regardless.
    async fn delete_events(&self, booking: &Booking, organizer: &TeamMember) {
        let Some(ref refresh_token) = organizer.google_refresh_token else {
            tracing::warn!(
                booking_id = %booking.id,
                organizer_id = %organizer.id,
                "Organizer has no connected calendar; leaving events in place"
            );
            return;
        };

        let access_token = match self.calendar.refresh_access_token(refresh_token).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(
                    booking_id = %booking.id,
                    organizer_id = %organizer.id,
                    "Failed to refresh organizer token for cancellation: {:#}",
                    e
                );
                return;
            }
        };

        let event_ids = std::iter::once(&booking.google_event_id).chain(&booking.guest_event_id);
        for event_id in event_ids {
            if let Err(e) = self
                .calendar
                .delete_event(&access_token, &organizer.google_calendar_id, event_id)
                .await
            {
                tracing::warn!(
                    booking_id = %booking.id,
                    event_id = %event_id,
                    "Failed to delete calendar event: {:#}",
                    e
                );
            }
        }
    }
}
