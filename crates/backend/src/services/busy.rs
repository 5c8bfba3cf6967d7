//! Concurrent busy-time fetch across members.
//!
//! Every member gets its own token refresh and busy query; failures are kept
//! per member so callers can decide which ones matter.

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use shared_types::BusySlot;
use uuid::Uuid;

use crate::google::CalendarProvider;
use crate::models::TeamMember;

/// Outcome of fetching one member's calendar
#[derive(Debug)]
pub struct MemberBusy {
    pub member_id: Uuid,
    /// Present when the refresh succeeded, even if the busy query failed
    pub access_token: Option<String>,
    pub busy: anyhow::Result<Vec<BusySlot>>,
}

async fn fetch_member(
    calendar: &dyn CalendarProvider,
    member: &TeamMember,
    time_min: DateTime<Utc>,
    time_max: DateTime<Utc>,
) -> MemberBusy {
    let Some(ref refresh_token) = member.google_refresh_token else {
        return MemberBusy {
            member_id: member.id,
            access_token: None,
            busy: Err(anyhow::anyhow!("Member has no connected calendar")),
        };
    };

    let access_token = match calendar.refresh_access_token(refresh_token).await {
        Ok(token) => token,
        Err(e) => {
            return MemberBusy {
                member_id: member.id,
                access_token: None,
                busy: Err(e.context("Failed to refresh access token")),
            }
        }
    };

    let busy = calendar
        .busy_intervals(&access_token, &member.google_calendar_id, time_min, time_max)
        .await
        .context("Failed to fetch busy intervals");

    MemberBusy {
        member_id: member.id,
        access_token: Some(access_token),
        busy,
    }
}

/// Fetch busy intervals for every member in `[time_min, time_max]`.
///
/// Results come back in member order. Failures are logged with the member
/// id and left in the result for the caller.
pub async fn fetch_busy(
    calendar: &dyn CalendarProvider,
    members: &[TeamMember],
    time_min: DateTime<Utc>,
    time_max: DateTime<Utc>,
) -> Vec<MemberBusy> {
    let results = join_all(
        members
            .iter()
            .map(|member| fetch_member(calendar, member, time_min, time_max)),
    )
    .await;

    for result in &results {
        if let Err(ref e) = result.busy {
            tracing::warn!(
                member_id = %result.member_id,
                "Skipping member busy data: {:#}",
                e
            );
        }
    }

    results
}

/// Busy arrays of the members whose fetch succeeded.
pub fn successful_busy(results: &[MemberBusy]) -> Vec<Vec<BusySlot>> {
    results
        .iter()
        .filter_map(|r| r.busy.as_ref().ok().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{member, utc, FakeCalendar};

    #[tokio::test]
    async fn test_failures_are_isolated_per_member() {
        let calendar = FakeCalendar::default();
        let ok = member("ok@example.com");
        let broken_refresh = member("refresh@example.com");
        let broken_busy = member("busy@example.com");

        calendar.add_busy(
            &ok.google_calendar_id,
            utc("2026-10-20T01:00:00Z"),
            utc("2026-10-20T02:00:00Z"),
        );
        calendar.fail_refresh_for(broken_refresh.google_refresh_token.as_deref().unwrap());
        calendar.fail_busy_for(&broken_busy.google_calendar_id);

        let members = vec![ok.clone(), broken_refresh.clone(), broken_busy.clone()];
        let results = fetch_busy(
            &calendar,
            &members,
            utc("2026-10-20T00:00:00Z"),
            utc("2026-10-21T00:00:00Z"),
        )
        .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].member_id, ok.id);
        assert_eq!(results[0].busy.as_ref().unwrap().len(), 1);
        assert!(results[1].access_token.is_none());
        assert!(results[1].busy.is_err());
        assert!(results[2].access_token.is_some());
        assert!(results[2].busy.is_err());

        assert_eq!(successful_busy(&results).len(), 1);
    }
}
