//! Storage seam for the booking services.
//!
//! Services only see [`Store`]; [`PgStore`] backs it with the diesel-async
//! pool and the per-table functions in [`crate::db`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::{self, DbPool};
use crate::models::{Booking, EventType, MaintenanceMode, NewBooking, TeamMember};

#[async_trait]
pub trait Store: Send + Sync {
    async fn event_type(&self, id: Uuid) -> Result<Option<EventType>>;

    /// Ids of members explicitly assigned to an event type.
    async fn event_type_member_ids(&self, event_type_id: Uuid) -> Result<Vec<Uuid>>;

    async fn member(&self, id: Uuid) -> Result<Option<TeamMember>>;

    async fn members(&self, ids: &[Uuid]) -> Result<Vec<TeamMember>>;

    /// Active note-takers of a team.
    async fn note_takers(&self, team_id: Uuid) -> Result<Vec<TeamMember>>;

    async fn booking(&self, id: Uuid) -> Result<Option<Booking>>;

    async fn insert_booking(&self, booking: NewBooking) -> Result<Booking>;

    /// Conditionally cancel a booking; see [`db::bookings::mark_canceled`].
    async fn mark_booking_canceled(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool>;

    async fn log_usage(&self, endpoint: &str, request_count: i32) -> Result<()>;

    async fn usage_since(&self, since: DateTime<Utc>) -> Result<i64>;

    async fn maintenance_mode(&self) -> Result<MaintenanceMode>;
}

/// PostgreSQL-backed [`Store`]
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn event_type(&self, id: Uuid) -> Result<Option<EventType>> {
        let mut conn = self.pool.get().await?;
        db::event_types::get_by_id(&mut conn, id).await
    }

    async fn event_type_member_ids(&self, event_type_id: Uuid) -> Result<Vec<Uuid>> {
        let mut conn = self.pool.get().await?;
        db::event_types::member_ids(&mut conn, event_type_id).await
    }

    async fn member(&self, id: Uuid) -> Result<Option<TeamMember>> {
        let mut conn = self.pool.get().await?;
        db::members::get_by_id(&mut conn, id).await
    }

    async fn members(&self, ids: &[Uuid]) -> Result<Vec<TeamMember>> {
        let mut conn = self.pool.get().await?;
        db::members::list_by_ids(&mut conn, ids).await
    }

    async fn note_takers(&self, team_id: Uuid) -> Result<Vec<TeamMember>> {
        let mut conn = self.pool.get().await?;
        db::members::list_note_takers(&mut conn, team_id).await
    }

    async fn booking(&self, id: Uuid) -> Result<Option<Booking>> {
        let mut conn = self.pool.get().await?;
        db::bookings::get_by_id(&mut conn, id).await
    }

    async fn insert_booking(&self, booking: NewBooking) -> Result<Booking> {
        let mut conn = self.pool.get().await?;
        db::bookings::create(&mut conn, booking).await
    }

    async fn mark_booking_canceled(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut conn = self.pool.get().await?;
        db::bookings::mark_canceled(&mut conn, id, at).await
    }

    async fn log_usage(&self, endpoint: &str, request_count: i32) -> Result<()> {
        let mut conn = self.pool.get().await?;
        db::usage_logs::create(&mut conn, endpoint, request_count).await
    }

    async fn usage_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let mut conn = self.pool.get().await?;
        db::usage_logs::total_since(&mut conn, since).await
    }

    async fn maintenance_mode(&self) -> Result<MaintenanceMode> {
        let mut conn = self.pool.get().await?;
        match db::settings::get(&mut conn, MaintenanceMode::KEY).await? {
            Some(raw) => serde_json::from_str(&raw).context("Invalid maintenance_mode setting"),
            None => Ok(MaintenanceMode::default()),
        }
    }
}
