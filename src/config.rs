use clap::{ArgAction, Parser};
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

use crate::backend::RetryPolicy;
use crate::poller::{BackoffPolicy, PollerConfig};

/// In-game overlay core: game detection, window control and participant polling
#[derive(Parser, Debug, Clone)]
#[command(name = "abtracker-overlay", version, about)]
pub struct Config {
    /// Base URL of the game's local live-client-data API
    #[arg(
        long,
        env = "TELEMETRY_URL",
        default_value = "https://127.0.0.1:2999/liveclientdata"
    )]
    pub telemetry_url: String,

    /// Per-request timeout for the live-client-data API (milliseconds)
    #[arg(long, env = "TELEMETRY_TIMEOUT_MS", default_value = "5000")]
    pub telemetry_timeout_ms: u64,

    /// Account/match backend base URL
    #[arg(long, env = "BACKEND_URL", default_value = "http://localhost:8080")]
    pub backend_url: String,

    /// Per-request timeout for the backend (seconds)
    #[arg(long, env = "BACKEND_TIMEOUT_SECS", default_value = "10")]
    pub backend_timeout_secs: u64,

    /// Baseline participant polling interval (milliseconds)
    #[arg(long, env = "POLL_INTERVAL_MS", default_value = "60000")]
    pub poll_interval_ms: u64,

    /// Liveness check interval once participants are cached (milliseconds)
    #[arg(long, env = "LIVE_CHECK_INTERVAL_MS", default_value = "5000")]
    pub live_check_interval_ms: u64,

    /// Start participant polling on launch
    #[arg(
        long,
        env = "POLLING_ENABLED",
        default_value = "true",
        action = ArgAction::Set
    )]
    pub polling_enabled: bool,

    /// Local bridge API listen address
    #[arg(long, env = "API_ADDR", default_value = "127.0.0.1:7870")]
    pub api_addr: String,

    /// Name of the declared overlay window
    #[arg(long, env = "OVERLAY_WINDOW", default_value = "in_game")]
    pub overlay_window: String,

    /// Hotkey that toggles the overlay window
    #[arg(long, env = "TOGGLE_HOTKEY", default_value = "show_hide_in_game")]
    pub toggle_hotkey: String,

    /// Key combination bound to the toggle hotkey
    #[arg(long, env = "TOGGLE_BINDING", default_value = "Ctrl+Tab")]
    pub toggle_binding: String,

    /// Base game ids the overlay activates for (comma separated)
    #[arg(
        long,
        env = "SUPPORTED_GAMES",
        default_value = "5426,10902",
        value_delimiter = ','
    )]
    pub supported_games: Vec<u32>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if Url::parse(&self.telemetry_url).is_err() {
            anyhow::bail!("TELEMETRY_URL is not a valid URL: {}", self.telemetry_url);
        }
        if Url::parse(&self.backend_url).is_err() {
            anyhow::bail!("BACKEND_URL is not a valid URL: {}", self.backend_url);
        }
        if self.api_addr.parse::<SocketAddr>().is_err() {
            anyhow::bail!("API_ADDR must be a socket address: {}", self.api_addr);
        }
        if self.telemetry_timeout_ms == 0 || self.backend_timeout_secs == 0 {
            anyhow::bail!("request timeouts must be positive");
        }
        if self.poll_interval_ms == 0 || self.live_check_interval_ms == 0 {
            anyhow::bail!("polling intervals must be positive");
        }
        if self.live_check_interval_ms > self.poll_interval_ms {
            anyhow::bail!("live_check_interval_ms must not exceed poll_interval_ms");
        }
        if self.supported_games.is_empty() {
            anyhow::bail!("at least one supported game id is required");
        }
        if self.overlay_window.is_empty() {
            anyhow::bail!("overlay_window must not be empty");
        }
        Ok(())
    }

    pub fn telemetry_timeout(&self) -> Duration {
        Duration::from_millis(self.telemetry_timeout_ms)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn poller(&self) -> PollerConfig {
        PollerConfig {
            polling_interval: Duration::from_millis(self.poll_interval_ms),
            live_check_interval: Duration::from_millis(self.live_check_interval_ms),
            backoff: BackoffPolicy::default(),
            enabled: self.polling_enabled,
        }
    }

    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy::default()
    }
}
