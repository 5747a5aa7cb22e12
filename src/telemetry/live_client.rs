use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::TelemetrySource;
use crate::error::FetchError;
use crate::models::{parse_summoner_name, GameStats, RiotId};

/// Client for the game's local live-client-data endpoint.
///
/// The endpoint serves HTTPS on localhost with a self-signed certificate, so
/// certificate validation is disabled for this client only.
#[derive(Clone)]
pub struct LiveClientData {
    http: Client,
    base_url: Url,
}

impl LiveClientData {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).context("Invalid telemetry URL")?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Telemetry URL cannot be used as a base: {}", base_url);
        }
        let http = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .context("Failed to build telemetry HTTP client")?;
        Ok(LiveClientData { http, base_url })
    }

    fn endpoint(&self, route: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(route);
        }
        url
    }

    async fn get(&self, url: Url) -> Result<Response, FetchError> {
        let resp = self.http.get(url.clone()).send().await.map_err(|e| {
            warn!("Live client request failed: {}: {}", url, e);
            FetchError::from(e)
        })?;

        let status = resp.status();
        if !status.is_success() {
            warn!("Live client API error {} for {}", status, url);
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                message: format!(
                    "Live client API error: {}",
                    status.canonical_reason().unwrap_or("unknown status")
                ),
            });
        }
        Ok(resp)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, route: &str) -> Result<T, FetchError> {
        let resp = self.get(self.endpoint(route)).await?;
        resp.json::<T>().await.map_err(FetchError::from)
    }

    pub async fn game_stats(&self) -> Result<GameStats, FetchError> {
        debug!("Fetching game stats");
        self.fetch_json("gamestats").await
    }

    pub async fn all_game_data(&self) -> Result<serde_json::Value, FetchError> {
        debug!("Fetching all game data");
        self.fetch_json("allgamedata").await
    }

    pub async fn player_list(&self) -> Result<Vec<serde_json::Value>, FetchError> {
        debug!("Fetching player list");
        self.fetch_json("playerlist").await
    }

    pub async fn active_player(&self) -> Result<serde_json::Value, FetchError> {
        debug!("Fetching active player data");
        self.fetch_json("activeplayer").await
    }

    /// Scoreboard line for `summoner_name`, or for the active player when `None`.
    pub async fn player_score(
        &self,
        summoner_name: Option<&str>,
    ) -> Result<serde_json::Value, FetchError> {
        let mut url = self.endpoint("playerscore");
        if let Some(name) = summoner_name {
            url.query_pairs_mut().append_pair("summonerName", name);
        }
        debug!(
            "Fetching player score: {}",
            summoner_name.unwrap_or("active player")
        );
        let resp = self.get(url).await?;
        resp.json().await.map_err(FetchError::from)
    }
}

#[async_trait]
impl TelemetrySource for LiveClientData {
    async fn is_game_live(&self) -> bool {
        match self.http.get(self.endpoint("gamestats")).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("Liveness probe failed: {}", e);
                false
            }
        }
    }

    async fn active_player_name(&self) -> Result<RiotId, FetchError> {
        debug!("Fetching active player name");
        let resp = self.get(self.endpoint("activeplayername")).await?;
        let raw = resp.text().await.map_err(FetchError::from)?;
        Ok(parse_summoner_name(&raw))
    }
}
