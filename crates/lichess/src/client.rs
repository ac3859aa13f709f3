//! REST client for the Lichess API.

use crate::error::{Error, Result};
use crate::types::{Broadcast, TvChannels};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Default API host.
pub const DEFAULT_BASE_URL: &str = "https://lichess.org";

/// User-Agent sent with every request, as the API guidelines ask.
const USER_AGENT: &str = "chess-openings-live/0.1";

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin typed client over the handful of Lichess endpoints the poller uses.
#[derive(Debug, Clone)]
pub struct LichessClient {
    http: reqwest::Client,
    base_url: String,
}

impl LichessClient {
    /// Create a client against the public API host.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client against a custom host (used by tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the current TV channel listing.
    pub async fn tv_channels(&self) -> Result<TvChannels> {
        let url = format!("{}/api/tv/channels", self.base_url);
        let body = self.get_text(&url, "application/json").await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch the official broadcast listing (ND-JSON, one tour per line).
    pub async fn broadcasts(&self) -> Result<Vec<Broadcast>> {
        let url = format!("{}/api/broadcast", self.base_url);
        let body = self.get_text(&url, "application/x-ndjson").await?;

        let mut broadcasts = Vec::new();
        for line in body.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            broadcasts.push(serde_json::from_str(line)?);
        }
        Ok(broadcasts)
    }

    /// Fetch one broadcast round. The payload shape varies, so it is
    /// returned as a raw value for the extraction helpers.
    pub async fn broadcast_round(&self, round_id: &str) -> Result<Value> {
        let url = format!("{}/api/broadcast/round/{}", self.base_url, round_id);
        let body = self.get_text(&url, "application/json").await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch a game export as raw JSON text, ready for the source adapter.
    pub async fn export_game_raw(&self, game_id: &str) -> Result<String> {
        let url = format!(
            "{}/game/export/{}?moves=true&opening=true&clocks=false&evals=false",
            self.base_url, game_id
        );
        self.get_text(&url, "application/json").await
    }

    async fn get_text(&self, url: &str, accept: &str) -> Result<String> {
        debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, accept)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = LichessClient::with_base_url("http://localhost:9999/").unwrap();
        assert_eq!(client.base_url, "http://localhost:9999");
    }
}
