//! OAuth token refresh against Google's token endpoint.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

#[derive(Serialize)]
struct RefreshRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    refresh_token: &'a str,
    grant_type: &'a str,
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
}

/// Trade a refresh token for a short-lived access token.
pub async fn refresh_access_token(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<String> {
    let response = client
        .post(TOKEN_ENDPOINT)
        .form(&RefreshRequest {
            client_id,
            client_secret,
            refresh_token,
            grant_type: "refresh_token",
        })
        .send()
        .await
        .context("Token refresh request failed")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Token refresh failed ({}): {}", status, body);
    }

    let tokens: TokenResponse = response
        .json()
        .await
        .context("Invalid token refresh response")?;

    Ok(tokens.access_token)
}
