use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use chrono_tz::Asia::Tokyo;
use clap::{Parser, Subcommand};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared_types::{
    AvailabilityResponse, CancelBookingRequest, CancelBookingResponse, CreateBookingRequest,
    CreateBookingResponse,
};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "teamslot-cli")]
#[command(about = "CLI for browsing availability and managing bookings via the public API")]
#[command(
    long_about = "A command-line interface for the team scheduling backend.\n\n\
    Lists bookable slots for an event type, submits bookings, and cancels them\n\
    with the single-use token from the cancel link."
)]
struct Cli {
    /// Backend server URL to connect to.
    #[arg(
        short,
        long,
        default_value = "http://localhost:3000",
        env = "TEAMSLOT_API_URL"
    )]
    base_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List bookable slots for an event type
    ///
    /// Slots are printed in Asia/Tokyo local time.
    Availability {
        /// The UUID of the event type.
        event_type_id: Uuid,

        /// How many days ahead to search, starting today.
        #[arg(short, long, value_name = "DAYS")]
        days: Option<u32>,
    },

    /// Book a slot
    ///
    /// Start and end must match a slot returned by 'availability'.
    Book {
        /// The UUID of the event type.
        event_type_id: Uuid,

        /// Slot start as RFC 3339 (e.g. 2026-10-20T10:00:00+09:00).
        #[arg(long, value_name = "DATETIME")]
        start: DateTime<Utc>,

        /// Slot end as RFC 3339.
        #[arg(long, value_name = "DATETIME")]
        end: DateTime<Utc>,

        #[arg(long, value_name = "TEXT")]
        name: String,

        #[arg(long, value_name = "EMAIL")]
        email: String,

        #[arg(long, value_name = "TEXT")]
        company: Option<String>,

        /// What the meeting is about.
        #[arg(long, value_name = "TEXT")]
        note: String,
    },

    /// Cancel a booking with its cancel token
    Cancel {
        booking_id: Uuid,
        token: String,
    },

    /// Cancel a booking using the full cancel link from the confirmation
    CancelUrl {
        #[arg(value_name = "URL")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = cli.base_url.trim_end_matches('/');

    match cli.command {
        Commands::Availability {
            event_type_id,
            days,
        } => {
            let mut url = format!(
                "{}/api/public/event-types/{}/availability",
                base_url, event_type_id
            );
            if let Some(days) = days {
                url.push_str(&format!("?daysAhead={}", days));
            }
            let availability: AvailabilityResponse =
                read_json(client.get(&url).send().await?).await?;

            println!(
                "{} ({} min)",
                availability.event_type.title, availability.event_type.duration_minutes
            );
            if availability.slots.is_empty() {
                println!("No slots available.");
            }
            for slot in availability.slots {
                let start = slot.start.with_timezone(&Tokyo);
                let end = slot.end.with_timezone(&Tokyo);
                println!(
                    "  {} - {}",
                    start.format("%Y-%m-%d (%a) %H:%M"),
                    end.format("%H:%M")
                );
            }
        }
        Commands::Book {
            event_type_id,
            start,
            end,
            name,
            email,
            company,
            note,
        } => {
            let req = CreateBookingRequest {
                event_type_id,
                start_at: start,
                end_at: end,
                name,
                email,
                company_name: company,
                note,
            };
            let created: CreateBookingResponse = read_json(
                client
                    .post(format!("{}/api/public/bookings", base_url))
                    .json(&req)
                    .send()
                    .await?,
            )
            .await?;

            println!(
                "Booked: [{}] {} at {}",
                &created.booking.id.to_string()[..8],
                created.booking.event_title,
                created
                    .booking
                    .start_at
                    .with_timezone(&Tokyo)
                    .format("%Y-%m-%d %H:%M")
            );
            if let Some(link) = &created.meet_link {
                println!("    Meet: {}", link);
            }
            println!("    Cancel: {}", created.cancel_url);
        }
        Commands::Cancel { booking_id, token } => {
            cancel(&client, base_url, booking_id, token).await?;
        }
        Commands::CancelUrl { url } => {
            let (booking_id, token) = parse_cancel_url(&url)?;
            cancel(&client, base_url, booking_id, token).await?;
        }
    }

    Ok(())
}

async fn cancel(
    client: &Client,
    base_url: &str,
    booking_id: Uuid,
    token: String,
) -> anyhow::Result<()> {
    let req = CancelBookingRequest { booking_id, token };
    let response: CancelBookingResponse = read_json(
        client
            .post(format!("{}/api/public/bookings/cancel", base_url))
            .json(&req)
            .send()
            .await?,
    )
    .await?;

    if response.success {
        println!("Canceled booking: {}", booking_id);
    }
    Ok(())
}

/// Decode a success body, or surface the server's error body.
async fn read_json<T: DeserializeOwned>(response: Response) -> anyhow::Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Request failed ({}): {}", status, body);
    }
    response.json().await.context("Failed to parse response")
}

/// Pull `bookingId` and `token` out of a cancel link.
fn parse_cancel_url(url: &str) -> anyhow::Result<(Uuid, String)> {
    let query = url
        .split_once('?')
        .map(|(_, q)| q)
        .context("Cancel link has no query string")?;

    let mut booking_id = None;
    let mut token = None;
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = urlencoding::decode(value)
            .with_context(|| format!("Invalid encoding for {}", key))?
            .into_owned();
        match key {
            "bookingId" => booking_id = Some(value),
            "token" => token = Some(value),
            _ => {}
        }
    }

    let booking_id = booking_id
        .context("Cancel link is missing bookingId")?
        .parse::<Uuid>()
        .context("bookingId is not a UUID")?;
    let token = token.context("Cancel link is missing token")?;
    Ok((booking_id, token))
}
