pub mod live_client;

pub use live_client::LiveClientData;

use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::FetchError;
use crate::models::RiotId;

/// Source of local live-game data.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Liveness probe. Any failure reads as "not live".
    async fn is_game_live(&self) -> bool;

    /// Identity of the player running this client.
    async fn active_player_name(&self) -> Result<RiotId, FetchError>;

    /// Probe up to `max_attempts` times, sleeping `interval` between probes.
    async fn wait_for_game_start(&self, max_attempts: u32, interval: Duration) -> bool {
        info!("Waiting for game to start...");
        for attempt in 1..=max_attempts {
            if self.is_game_live().await {
                info!("Game is live (attempt {})", attempt);
                return true;
            }
            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }
        warn!("Game start timeout reached after {} attempts", max_attempts);
        false
    }
}
