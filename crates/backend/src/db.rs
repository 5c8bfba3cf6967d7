use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager, ManagerConfig},
    AsyncPgConnection, RunQueryDsl,
};
use uuid::Uuid;

use crate::models::{Booking, BookingRow, EventType, EventTypeRow, NewBooking, TeamMember};

pub type DbPool = Pool<AsyncPgConnection>;

async fn establish_tls_connection(config: String) -> diesel::ConnectionResult<AsyncPgConnection> {
    // Set up rustls TLS configuration
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

    let (client, connection) = tokio_postgres::connect(&config, tls)
        .await
        .map_err(|e| diesel::ConnectionError::BadConnection(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    AsyncPgConnection::try_from(client).await
}

pub fn establish_connection_pool(database_url: &str) -> anyhow::Result<DbPool> {
    let mut manager_config = ManagerConfig::default();
    manager_config.custom_setup =
        Box::new(|url| Box::pin(establish_tls_connection(url.to_string())));

    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new_with_config(
        database_url,
        manager_config,
    );
    let pool = Pool::builder(config).build()?;

    Ok(pool)
}

// Team member database operations
pub mod members {
    use super::*;

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        member_id: Uuid,
    ) -> anyhow::Result<Option<TeamMember>> {
        use crate::schema::team_members::dsl::*;

        let member = team_members
            .filter(id.eq(member_id))
            .select(TeamMember::as_select())
            .first(conn)
            .await
            .optional()?;

        Ok(member)
    }

    pub async fn list_by_ids(
        conn: &mut AsyncPgConnection,
        member_ids: &[Uuid],
    ) -> anyhow::Result<Vec<TeamMember>> {
        use crate::schema::team_members::dsl::*;

        if member_ids.is_empty() {
            return Ok(Vec::new());
        }

        let members = team_members
            .filter(id.eq_any(member_ids))
            .select(TeamMember::as_select())
            .load(conn)
            .await?;

        Ok(members)
    }

    /// Active note-takers of a team.
    pub async fn list_note_takers(
        conn: &mut AsyncPgConnection,
        team: Uuid,
    ) -> anyhow::Result<Vec<TeamMember>> {
        use crate::schema::team_members::dsl::*;

        let members = team_members
            .filter(team_id.eq(team))
            .filter(is_note_taker.eq(true))
            .filter(is_active.eq(true))
            .order_by(created_at.asc())
            .select(TeamMember::as_select())
            .load(conn)
            .await?;

        Ok(members)
    }
}

// Event type database operations
pub mod event_types {
    use super::*;

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        event_type_id: Uuid,
    ) -> anyhow::Result<Option<EventType>> {
        use crate::schema::event_types::dsl::*;

        let row = event_types
            .filter(id.eq(event_type_id))
            .select(EventTypeRow::as_select())
            .first(conn)
            .await
            .optional()?;

        row.map(EventType::try_from).transpose()
    }

    /// Members explicitly assigned to an event type.
    pub async fn member_ids(
        conn: &mut AsyncPgConnection,
        event_type: Uuid,
    ) -> anyhow::Result<Vec<Uuid>> {
        use crate::schema::event_type_members::dsl::*;

        let ids = event_type_members
            .filter(event_type_id.eq(event_type))
            .select(member_id)
            .load::<Uuid>(conn)
            .await?;

        Ok(ids)
    }
}

// Booking database operations
pub mod bookings {
    use super::*;
    use shared_types::BookingStatus;

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        booking_id: Uuid,
    ) -> anyhow::Result<Option<Booking>> {
        use crate::schema::bookings::dsl::*;

        let row = bookings
            .filter(id.eq(booking_id))
            .select(BookingRow::as_select())
            .first(conn)
            .await
            .optional()?;

        row.map(Booking::try_from).transpose()
    }

    pub async fn create(conn: &mut AsyncPgConnection, booking: NewBooking) -> anyhow::Result<Booking> {
        use crate::schema::bookings::dsl::*;

        let row = diesel::insert_into(bookings)
            .values(&booking)
            .returning(BookingRow::as_returning())
            .get_result(conn)
            .await?;

        Booking::try_from(row)
    }

    /// Transition a confirmed booking that still holds a token hash to
    /// canceled, clearing the hash. Returns false if no row matched.
    pub async fn mark_canceled(
        conn: &mut AsyncPgConnection,
        booking_id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        use crate::schema::bookings::dsl::*;

        let updated = diesel::update(
            bookings
                .filter(id.eq(booking_id))
                .filter(status.eq(BookingStatus::Confirmed.as_str()))
                .filter(cancel_token_hash.is_not_null()),
        )
        .set((
            status.eq(BookingStatus::Canceled.as_str()),
            cancel_token_hash.eq(None::<String>),
            canceled_at.eq(Some(at)),
        ))
        .execute(conn)
        .await?;

        Ok(updated == 1)
    }
}

// API usage log database operations
pub mod usage_logs {
    use super::*;
    use diesel::dsl::sum;

    pub async fn create(
        conn: &mut AsyncPgConnection,
        endpoint_val: &str,
        count: i32,
    ) -> anyhow::Result<()> {
        use crate::schema::api_usage_logs::dsl::*;

        diesel::insert_into(api_usage_logs)
            .values((endpoint.eq(endpoint_val), request_count.eq(count)))
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Sum of request counts logged at or after `since`.
    pub async fn total_since(
        conn: &mut AsyncPgConnection,
        since: DateTime<Utc>,
    ) -> anyhow::Result<i64> {
        use crate::schema::api_usage_logs::dsl::*;

        let total = api_usage_logs
            .filter(created_at.ge(since))
            .select(sum(request_count))
            .first::<Option<i64>>(conn)
            .await?;

        Ok(total.unwrap_or(0))
    }
}

// App setting database operations
pub mod settings {
    use super::*;

    pub async fn get(conn: &mut AsyncPgConnection, setting_key: &str) -> anyhow::Result<Option<String>> {
        use crate::schema::app_settings::dsl::*;

        let setting = app_settings
            .filter(key.eq(setting_key))
            .select(value)
            .first::<String>(conn)
            .await
            .optional()?;

        Ok(setting)
    }
}
