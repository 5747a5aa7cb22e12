use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use super::AccountLookup;
use crate::error::FetchError;
use crate::models::{AccountInfo, RiotId};

/// Client for the remote account/match backend.
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: Url,
}

/// Structured error body the backend sends with non-2xx responses.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackendErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status_code: Option<u16>,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).context("Invalid backend URL")?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Backend URL cannot be used as a base: {}", base_url);
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(BackendClient { http, base_url })
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn route(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        debug!("Fetching from backend: {}", url);

        let resp = self
            .http
            .get(url.clone())
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| {
                error!("Backend request failed: {}: {}", url, e);
                FetchError::from(e)
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let body: BackendErrorBody = serde_json::from_str(&text).unwrap_or_default();
            error!(
                "Backend API error {} for {}: error={:?} statusCode={:?}",
                status, url, body.error, body.status_code
            );
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                message: error_message(status, body),
            });
        }

        resp.json::<T>().await.map_err(FetchError::from)
    }

    pub async fn account_by_riot_id(&self, name: &str, tag: &str) -> Result<AccountInfo, FetchError> {
        if name.is_empty() || tag.is_empty() {
            return Err(FetchError::Validation("Name and tag are required".into()));
        }
        info!("Fetching account data for: {}#{}", name, tag);
        self.fetch_json(self.route(&["account", name, tag])).await
    }

    pub async fn summoner_by_id(&self, summoner_id: &str) -> Result<serde_json::Value, FetchError> {
        if summoner_id.is_empty() {
            return Err(FetchError::Validation("Summoner ID is required".into()));
        }
        info!("Fetching summoner data: {}", summoner_id);
        self.fetch_json(self.route(&["summoner", summoner_id])).await
    }

    pub async fn match_by_id(&self, match_id: &str) -> Result<serde_json::Value, FetchError> {
        if match_id.is_empty() {
            return Err(FetchError::Validation("Match ID is required".into()));
        }
        info!("Fetching match data: {}", match_id);
        self.fetch_json(self.route(&["match", match_id])).await
    }

    /// Whether the backend answers at all. Never errors.
    pub async fn is_backend_available(&self) -> bool {
        match self.http.head(self.base_url.clone()).send().await {
            Ok(resp) => {
                debug!("Backend reachable ({})", resp.status());
                true
            }
            Err(e) => {
                warn!("Backend is not available: {}", e);
                false
            }
        }
    }

    /// Look up several accounts concurrently. A failed lookup yields `None`
    /// at its position instead of failing the batch.
    pub async fn multiple_accounts(&self, ids: &[RiotId]) -> Vec<Option<AccountInfo>> {
        info!("Fetching {} accounts", ids.len());
        let lookups = ids.iter().map(|id| async move {
            match self.account_by_riot_id(&id.name, &id.tag).await {
                Ok(account) => Some(account),
                Err(e) => {
                    error!("Failed to fetch account {}: {}", id, e);
                    None
                }
            }
        });
        futures_util::future::join_all(lookups).await
    }
}

#[async_trait]
impl AccountLookup for BackendClient {
    async fn account_by_riot_id(&self, name: &str, tag: &str) -> Result<AccountInfo, FetchError> {
        BackendClient::account_by_riot_id(self, name, tag).await
    }
}

fn error_message(status: StatusCode, body: BackendErrorBody) -> String {
    if !body.message.is_empty() {
        return body.message;
    }
    match status.canonical_reason() {
        Some(reason) => reason.to_string(),
        None => format!("Backend error: {}", status.as_u16()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::{extract::Path, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn client(base: &str) -> BackendClient {
        BackendClient::new(base, Duration::from_secs(2)).unwrap()
    }

    async fn account_handler(Path((name, tag)): Path<(String, String)>) -> axum::response::Response {
        match name.as_str() {
            "B" => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "error": "NotFound",
                    "message": "Summoner not found",
                    "statusCode": 404
                })),
            )
                .into_response(),
            "Plain" => (StatusCode::SERVICE_UNAVAILABLE, "down").into_response(),
            _ => Json(serde_json::json!({
                "puuid": format!("puuid-{}", name),
                "gameName": name,
                "tagLine": tag,
                "currentGame": {
                    "participants": [],
                    "gameMode": "CLASSIC",
                    "gameStartTime": 0,
                    "mapId": 11
                }
            }))
            .into_response(),
        }
    }

    fn backend_router() -> Router {
        Router::new()
            .route("/account/:name/:tag", get(account_handler))
            .route(
                "/match/:id",
                get(|Path(id): Path<String>| async move { Json(serde_json::json!({ "matchId": id })) }),
            )
    }

    #[tokio::test]
    async fn test_account_lookup_decodes() {
        let base = serve(backend_router()).await;
        let account = client(&base).account_by_riot_id("Foo", "NA1").await.unwrap();
        assert_eq!(account.game_name, "Foo");
        assert_eq!(account.tag_line, "NA1");
        assert_eq!(account.current_game.unwrap().map_id, 11);
    }

    #[tokio::test]
    async fn test_names_are_percent_encoded() {
        let base = serve(backend_router()).await;
        let account = client(&base)
            .account_by_riot_id("Foo Bar/Baz", "EUW")
            .await
            .unwrap();
        assert_eq!(account.game_name, "Foo Bar/Baz");
    }

    #[tokio::test]
    async fn test_empty_name_fails_without_network() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new().fallback(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                StatusCode::OK
            }
        });
        let base = serve(router).await;
        let c = client(&base);

        let err = c.account_by_riot_id("", "tag").await.unwrap_err();
        assert!(err.is_validation());
        assert!(c.summoner_by_id("").await.unwrap_err().is_validation());
        assert!(c.match_by_id("").await.unwrap_err().is_validation());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_structured_error_body() {
        let base = serve(backend_router()).await;
        let err = client(&base).account_by_riot_id("B", "2").await.unwrap_err();
        assert_eq!(
            err,
            FetchError::HttpStatus {
                status: 404,
                message: "Summoner not found".into()
            }
        );
    }

    #[tokio::test]
    async fn test_unstructured_error_falls_back_to_status_text() {
        let base = serve(backend_router()).await;
        let err = client(&base).account_by_riot_id("Plain", "1").await.unwrap_err();
        assert_eq!(
            err,
            FetchError::HttpStatus {
                status: 503,
                message: "Service Unavailable".into()
            }
        );
    }

    #[tokio::test]
    async fn test_multiple_accounts_isolates_failures() {
        let base = serve(backend_router()).await;
        let results = client(&base)
            .multiple_accounts(&[RiotId::new("A", "1"), RiotId::new("B", "2")])
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().game_name, "A");
        assert!(results[1].is_none());
    }

    #[tokio::test]
    async fn test_match_lookup_and_availability() {
        let base = serve(backend_router()).await;
        let c = client(&base);
        let m = c.match_by_id("EUW1_42").await.unwrap();
        assert_eq!(m["matchId"], "EUW1_42");
        assert!(c.is_backend_available().await);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        assert!(!client(&format!("http://{}", addr)).is_backend_available().await);
    }
}
