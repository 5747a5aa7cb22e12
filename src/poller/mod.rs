//! Game-session aware participant polling.
//!
//! The poller probes the local telemetry for liveness on a timer. When a game
//! is live and no participants are cached for the session it resolves the
//! active player and asks the backend for the match roster. Once a roster is
//! cached, backend polling stops and only the cheap liveness probe keeps
//! running, so the cache is dropped the moment the game ends.
//!
//! ```text
//!  Idle ──enable──▶ PollingNotLive ──live, no cache──▶ Fetching
//!                        ▲   ▲                          │      │
//!                        │   │             roster ok    │      │ failure
//!                        │   └──not live── CachedLive ◀─┘      ▼
//!                        └────────not live──────────────── Backoff
//! ```

pub mod backoff;
pub mod task;

pub use backoff::BackoffPolicy;
pub use task::{spawn, PollerHandle};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::backend::AccountLookup;
use crate::error::FetchError;
use crate::models::{Participant, TeamId};
use crate::telemetry::TelemetrySource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Idle,
    PollingNotLive,
    Fetching,
    CachedLive,
    Backoff,
}

/// Session transitions, delivered once each.
#[derive(Debug, Clone, PartialEq)]
pub enum PollerEvent {
    GameStarted(Vec<Participant>),
    GameEnded,
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Baseline interval between fetch cycles.
    pub polling_interval: Duration,
    /// Interval of the liveness-only probe while a roster is cached.
    pub live_check_interval: Duration,
    pub backoff: BackoffPolicy,
    pub enabled: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        PollerConfig {
            polling_interval: Duration::from_secs(60),
            live_check_interval: Duration::from_secs(5),
            backoff: BackoffPolicy::default(),
            enabled: true,
        }
    }
}

/// Everything consumers of the poller can observe.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollerSnapshot {
    pub phase: Phase,
    pub enabled: bool,
    pub participants: Vec<Participant>,
    pub is_loading: bool,
    pub is_game_live: bool,
    pub error: Option<String>,
    pub has_fetched_once: bool,
    pub error_count: u32,
    #[serde(rename = "currentIntervalMs", serialize_with = "serialize_millis")]
    pub current_interval: Duration,
    pub should_stop_polling: bool,
    /// Backend roster lookups issued since start.
    pub backend_fetches: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl PollerSnapshot {
    fn baseline(interval: Duration, enabled: bool) -> Self {
        PollerSnapshot {
            phase: if enabled { Phase::PollingNotLive } else { Phase::Idle },
            enabled,
            participants: Vec::new(),
            is_loading: false,
            is_game_live: false,
            error: None,
            has_fetched_once: false,
            error_count: 0,
            current_interval: interval,
            should_stop_polling: false,
            backend_fetches: 0,
            updated_at: None,
        }
    }
}

/// The participant polling state machine.
///
/// Mutated only by its own fetch cycles and by [`reset`](Self::reset); the
/// scheduling lives in [`task`].
pub struct ParticipantPoller {
    config: PollerConfig,
    telemetry: Arc<dyn TelemetrySource>,
    accounts: Arc<dyn AccountLookup>,
    state: PollerSnapshot,
    state_tx: watch::Sender<PollerSnapshot>,
    events: mpsc::Sender<PollerEvent>,
}

impl ParticipantPoller {
    pub fn new(
        config: PollerConfig,
        telemetry: Arc<dyn TelemetrySource>,
        accounts: Arc<dyn AccountLookup>,
        events: mpsc::Sender<PollerEvent>,
    ) -> Self {
        // Idle until the scheduler enables it.
        let mut state = PollerSnapshot::baseline(config.polling_interval, false);
        state.enabled = config.enabled;
        let (state_tx, _) = watch::channel(state.clone());
        ParticipantPoller {
            config,
            telemetry,
            accounts,
            state,
            state_tx,
            events,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PollerSnapshot> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> &PollerSnapshot {
        &self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    /// Delay until the next scheduled cycle; `None` while disabled.
    pub fn next_delay(&self) -> Option<Duration> {
        if !self.state.enabled {
            None
        } else if self.state.should_stop_polling {
            Some(self.config.live_check_interval)
        } else {
            Some(self.state.current_interval)
        }
    }

    pub fn enable(&mut self) {
        self.state.enabled = true;
        if self.state.phase == Phase::Idle {
            self.state.phase = Phase::PollingNotLive;
        }
        info!(
            "Starting game participants polling (interval={:?}, errors={})",
            self.state.current_interval, self.state.error_count
        );
        self.publish();
    }

    pub fn disable(&mut self) {
        self.state.enabled = false;
        self.state.phase = Phase::Idle;
        self.state.is_loading = false;
        info!("Stopping game participants polling");
        self.publish();
    }

    /// Clear everything back to the pre-fetch baseline without waiting for the
    /// game to end. Emits no session event.
    pub fn reset(&mut self) {
        let fetches = self.state.backend_fetches;
        self.state = PollerSnapshot::baseline(self.config.polling_interval, self.state.enabled);
        self.state.backend_fetches = fetches;
        debug!("Game participants state reset");
        self.publish();
    }

    /// One fetch cycle. With `force`, a cached roster is fetched again.
    pub async fn run_cycle(&mut self, force: bool) {
        self.state.is_loading = true;
        self.publish();

        if !self.telemetry.is_game_live().await {
            self.end_session();
            return;
        }
        self.state.is_game_live = true;

        let cached = self.state.has_fetched_once && !self.state.participants.is_empty();
        if cached && !force {
            debug!("Participants loaded; checking game state only");
            self.state.phase = Phase::CachedLive;
            self.state.should_stop_polling = true;
            self.state.error = None;
            self.state.error_count = 0;
            self.state.is_loading = false;
            self.publish();
            return;
        }

        self.state.phase = Phase::Fetching;
        self.publish();

        match self.fetch_participants().await {
            Ok(participants) => self.store(participants),
            Err(e) if cached => {
                warn!("Forced refetch failed, keeping cached participants: {}", e);
                self.state.phase = Phase::CachedLive;
                self.state.error = Some(e.to_string());
            }
            Err(e) => self.record_failure(e),
        }

        self.state.is_loading = false;
        self.publish();
    }

    async fn fetch_participants(&mut self) -> Result<Vec<Participant>, FetchError> {
        let player = self.telemetry.active_player_name().await?;
        info!("Active player: {}", player);

        self.state.backend_fetches += 1;
        let account = self
            .accounts
            .account_by_riot_id(&player.name, &player.tag)
            .await?;

        let roster = account
            .current_game
            .map(|game| game.participants)
            .unwrap_or_default();
        let total = roster.len();
        let participants: Vec<Participant> =
            roster.into_iter().filter(Participant::is_complete).collect();
        if participants.len() < total {
            warn!(
                "Dropped {} incomplete participant(s) from backend response",
                total - participants.len()
            );
        }
        if participants.is_empty() {
            warn!("No participants data in backend response");
            return Err(FetchError::NoData("No participants data available".into()));
        }
        Ok(participants)
    }

    fn store(&mut self, participants: Vec<Participant>) {
        let first_of_session = !self.state.has_fetched_once;
        let blue = participants.iter().filter(|p| p.team_id == TeamId::Blue).count();
        info!(
            "Fetched {} participants (blue={}, red={}); polling paused until the game ends",
            participants.len(),
            blue,
            participants.len() - blue
        );

        self.state.phase = Phase::CachedLive;
        self.state.has_fetched_once = true;
        self.state.should_stop_polling = true;
        self.state.error = None;
        self.state.error_count = 0;
        self.state.current_interval = self.config.polling_interval;
        self.state.participants = participants;

        if first_of_session {
            self.emit(PollerEvent::GameStarted(self.state.participants.clone()));
        }
    }

    fn record_failure(&mut self, e: FetchError) {
        self.state.error_count += 1;
        self.state.error = Some(e.to_string());
        self.state.phase = Phase::Backoff;

        let interval = self
            .config
            .backoff
            .interval_for(self.config.polling_interval, self.state.error_count);
        if interval != self.state.current_interval {
            warn!(
                "Multiple errors detected ({}), polling interval now {:?}",
                self.state.error_count, interval
            );
        }
        self.state.current_interval = interval;
        error!(
            "Failed to fetch participants (attempt {}): {}",
            self.state.error_count, e
        );
    }

    /// Not live: drop the session and return to baseline.
    fn end_session(&mut self) {
        let was_live = self.state.is_game_live;
        if was_live {
            info!("Game ended. Resetting state and resuming polling");
        } else {
            debug!("Game is not live");
        }

        self.state.phase = Phase::PollingNotLive;
        self.state.is_game_live = false;
        self.state.participants.clear();
        self.state.has_fetched_once = false;
        self.state.error_count = 0;
        self.state.current_interval = self.config.polling_interval;
        self.state.should_stop_polling = false;
        self.state.error = None;
        self.state.is_loading = false;
        self.publish();

        if was_live {
            self.emit(PollerEvent::GameEnded);
        }
    }

    fn publish(&mut self) {
        self.state.updated_at = Some(Utc::now());
        self.state_tx.send_replace(self.state.clone());
    }

    fn emit(&self, event: PollerEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(ev)) => {
                error!("Poller event channel full, event DROPPED: {:?}", ev)
            }
            Err(TrySendError::Closed(_)) => debug!("No poller event listener"),
        }
    }
}

#[cfg(test)]
pub(crate) mod mocks {
    use super::*;
    use crate::models::{AccountInfo, RiotId};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub struct MockTelemetry {
        pub live: AtomicBool,
        pub probes: AtomicUsize,
    }

    impl MockTelemetry {
        pub fn new(live: bool) -> Arc<Self> {
            Arc::new(MockTelemetry {
                live: AtomicBool::new(live),
                probes: AtomicUsize::new(0),
            })
        }

        pub fn set_live(&self, live: bool) {
            self.live.store(live, Ordering::SeqCst);
        }

        pub fn probes(&self) -> usize {
            self.probes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TelemetrySource for MockTelemetry {
        async fn is_game_live(&self) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.live.load(Ordering::SeqCst)
        }

        async fn active_player_name(&self) -> Result<RiotId, FetchError> {
            Ok(RiotId::new("Foo", "NA1"))
        }
    }

    pub struct MockAccounts {
        pub outcome: Mutex<Result<AccountInfo, FetchError>>,
        pub calls: AtomicUsize,
        pub delay: Duration,
    }

    impl MockAccounts {
        pub fn new(outcome: Result<AccountInfo, FetchError>) -> Arc<Self> {
            Self::slow(outcome, Duration::ZERO)
        }

        pub fn slow(outcome: Result<AccountInfo, FetchError>, delay: Duration) -> Arc<Self> {
            Arc::new(MockAccounts {
                outcome: Mutex::new(outcome),
                calls: AtomicUsize::new(0),
                delay,
            })
        }

        pub fn set(&self, outcome: Result<AccountInfo, FetchError>) {
            *self.outcome.lock().unwrap() = outcome;
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AccountLookup for MockAccounts {
        async fn account_by_riot_id(&self, _name: &str, _tag: &str) -> Result<AccountInfo, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.outcome.lock().unwrap().clone()
        }
    }
}
