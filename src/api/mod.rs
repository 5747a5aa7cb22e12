use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

use crate::backend::{with_retry, BackendClient, RetryPolicy};
use crate::error::FetchError;
use crate::host::{HotkeyPressed, LocalHost, OverlayWindows, RunningGameInfo, WindowState};
use crate::models::format::{
    calculate_kda, format_game_time, format_kda, format_mastery_points, format_rank,
    format_win_rate,
};
use crate::models::{group_by_team, GameStats, Participant, RiotId, Team, TeamId};
use crate::poller::{PollerHandle, PollerSnapshot};
use crate::telemetry::{LiveClientData, TelemetrySource};
use crate::window::{WindowHandle, WindowVisibilityState};

#[derive(Clone)]
pub struct AppState {
    pub poller: PollerHandle,
    pub telemetry: LiveClientData,
    pub backend: BackendClient,
    /// Retry schedule for on-demand backend lookups.
    pub retry: RetryPolicy,
    pub host: Arc<LocalHost>,
    pub window: WindowHandle,
}

/// Build the Axum router for the local bridge the overlay front-end talks to.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/state", get(state_handler))
        .route("/api/teams", get(teams_handler))
        .route("/api/refetch", post(refetch_handler))
        .route("/api/reset", post(reset_handler))
        .route("/api/polling", post(polling_handler))
        .route("/api/game/stats", get(game_stats_handler))
        .route("/api/game/all", get(all_game_data_handler))
        .route("/api/game/players", get(player_list_handler))
        .route("/api/game/active-player", get(active_player_handler))
        .route("/api/game/score", get(player_score_handler))
        .route("/api/game/wait", get(wait_for_game_handler))
        .route("/api/accounts/batch", post(accounts_batch_handler))
        .route("/api/accounts/:name/:tag", get(account_handler))
        .route("/api/summoners/:id", get(summoner_handler))
        .route("/api/matches/:id", get(match_handler))
        .route("/api/backend/health", get(backend_health_handler))
        .route("/api/host/game", post(host_game_handler))
        .route("/api/host/hotkey", post(host_hotkey_handler))
        .route("/api/window", get(window_handler))
        .route("/api/window/show", post(window_show_handler))
        .route("/api/window/hide", post(window_hide_handler))
        .route("/api/window/minimize", post(window_minimize_handler))
        .route("/api/window/drag", post(window_drag_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

fn telemetry_error(e: FetchError) -> (StatusCode, String) {
    (StatusCode::BAD_GATEWAY, e.to_string())
}

fn backend_error(e: FetchError) -> (StatusCode, String) {
    let status = match &e {
        FetchError::Validation(_) => StatusCode::BAD_REQUEST,
        FetchError::HttpStatus { status: 404, .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    };
    (status, e.to_string())
}

// ── Poller ───────────────────────────────────────────────────────────────────

/// GET /api/state
async fn state_handler(State(state): State<Arc<AppState>>) -> Json<PollerSnapshot> {
    Json(state.poller.snapshot())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlayerView {
    summoner_name: String,
    champion_name: String,
    rank: String,
    mastery_level: u32,
    mastery_points: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    win_rate: Option<String>,
}

impl From<&Participant> for PlayerView {
    fn from(p: &Participant) -> Self {
        PlayerView {
            summoner_name: p.summoner_name.clone(),
            champion_name: p.champion_name.clone(),
            rank: format_rank(&p.tier, &p.rank),
            mastery_level: p.mastery.level,
            mastery_points: format_mastery_points(p.mastery.points),
            win_rate: win_rate_label(p),
        }
    }
}

/// Win rate from the player's recent games, when the backend sent one.
fn win_rate_label(p: &Participant) -> Option<String> {
    p.stats.as_ref()?.win_rate.map(format_win_rate)
}

#[derive(Debug, Serialize)]
struct TeamView {
    id: TeamId,
    players: Vec<PlayerView>,
}

impl From<Team> for TeamView {
    fn from(team: Team) -> Self {
        TeamView {
            id: team.id,
            players: team.participants.iter().map(PlayerView::from).collect(),
        }
    }
}

/// GET /api/teams
async fn teams_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.poller.snapshot();
    let teams: Vec<TeamView> = group_by_team(&snapshot.participants)
        .into_iter()
        .map(TeamView::from)
        .collect();
    Json(teams)
}

/// POST /api/refetch
async fn refetch_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    state.poller.refetch().await;
    StatusCode::ACCEPTED
}

/// POST /api/reset
async fn reset_handler(State(state): State<Arc<AppState>>) -> Json<PollerSnapshot> {
    state.poller.reset().await;
    Json(state.poller.snapshot())
}

#[derive(Debug, Deserialize)]
struct PollingToggle {
    enabled: bool,
}

/// POST /api/polling
async fn polling_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PollingToggle>,
) -> StatusCode {
    state.poller.set_enabled(body.enabled).await;
    StatusCode::ACCEPTED
}

// ── Telemetry pass-through ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GameStatsView {
    #[serde(flatten)]
    stats: GameStats,
    game_time_label: String,
}

/// GET /api/game/stats
async fn game_stats_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let stats = state.telemetry.game_stats().await.map_err(telemetry_error)?;
    let game_time_label = format_game_time(stats.game_time.max(0.0) as u64);
    Ok(Json(GameStatsView {
        stats,
        game_time_label,
    }))
}

/// GET /api/game/all
async fn all_game_data_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .telemetry
        .all_game_data()
        .await
        .map(Json)
        .map_err(telemetry_error)
}

/// GET /api/game/players
async fn player_list_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .telemetry
        .player_list()
        .await
        .map(Json)
        .map_err(telemetry_error)
}

/// GET /api/game/active-player
async fn active_player_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .telemetry
        .active_player()
        .await
        .map(Json)
        .map_err(telemetry_error)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreQuery {
    summoner_name: Option<String>,
}

/// GET /api/game/score?summonerName=Foo
async fn player_score_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScoreQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let score = state
        .telemetry
        .player_score(query.summoner_name.as_deref())
        .await
        .map_err(telemetry_error)?;

    let (kills, deaths, assists) = (
        score_count(&score, "kills"),
        score_count(&score, "deaths"),
        score_count(&score, "assists"),
    );
    Ok(Json(json!({
        "kills": kills,
        "deaths": deaths,
        "assists": assists,
        "creepScore": score.get("creepScore").cloned().unwrap_or(Value::Null),
        "kda": format_kda(kills, deaths, assists),
        "kdaRatio": calculate_kda(kills, deaths, assists),
    })))
}

/// Missing counts read as zero; oversized ones saturate.
fn score_count(score: &Value, key: &str) -> u32 {
    score
        .get(key)
        .and_then(Value::as_u64)
        .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WaitQuery {
    #[serde(default = "default_wait_attempts")]
    attempts: u32,
    #[serde(default = "default_wait_interval_ms")]
    interval_ms: u64,
}

fn default_wait_attempts() -> u32 {
    30
}

fn default_wait_interval_ms() -> u64 {
    2000
}

const MAX_WAIT_ATTEMPTS: u32 = 120;

/// GET /api/game/wait?attempts=30&intervalMs=2000
async fn wait_for_game_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WaitQuery>,
) -> impl IntoResponse {
    let attempts = query.attempts.clamp(1, MAX_WAIT_ATTEMPTS);
    let live = state
        .telemetry
        .wait_for_game_start(attempts, Duration::from_millis(query.interval_ms))
        .await;
    Json(json!({ "live": live }))
}

// ── Backend pass-through ─────────────────────────────────────────────────────

/// GET /api/accounts/:name/:tag
async fn account_handler(
    State(state): State<Arc<AppState>>,
    Path((name, tag)): Path<(String, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let backend = &state.backend;
    let (name, tag) = (name.as_str(), tag.as_str());
    with_retry(state.retry, move || backend.account_by_riot_id(name, tag))
        .await
        .map(Json)
        .map_err(backend_error)
}

/// POST /api/accounts/batch
async fn accounts_batch_handler(
    State(state): State<Arc<AppState>>,
    Json(ids): Json<Vec<RiotId>>,
) -> impl IntoResponse {
    Json(state.backend.multiple_accounts(&ids).await)
}

/// GET /api/summoners/:id
async fn summoner_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .backend
        .summoner_by_id(&id)
        .await
        .map(Json)
        .map_err(backend_error)
}

/// GET /api/matches/:id
async fn match_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .backend
        .match_by_id(&id)
        .await
        .map(Json)
        .map_err(backend_error)
}

/// GET /api/backend/health
async fn backend_health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "available": state.backend.is_backend_available().await }))
}

// ── Host bridge ──────────────────────────────────────────────────────────────

/// POST /api/host/game
async fn host_game_handler(
    State(state): State<Arc<AppState>>,
    Json(info): Json<RunningGameInfo>,
) -> impl IntoResponse {
    let update = state.host.report_game(info);
    Json(json!({ "runningChanged": update.running_changed }))
}

/// POST /api/host/hotkey
async fn host_hotkey_handler(
    State(state): State<Arc<AppState>>,
    Json(pressed): Json<HotkeyPressed>,
) -> StatusCode {
    state.host.press_hotkey(&pressed.name);
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WindowView {
    #[serde(flatten)]
    visibility: WindowVisibilityState,
    window_state: Option<WindowState>,
}

/// GET /api/window
async fn window_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let visibility = state.window.snapshot();
    let window_state = match &visibility.window_id {
        Some(id) => state.host.window_state(id).await.ok(),
        None => None,
    };
    Json(WindowView {
        visibility,
        window_state,
    })
}

/// POST /api/window/show
async fn window_show_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    state.window.show().await;
    StatusCode::ACCEPTED
}

/// POST /api/window/hide
async fn window_hide_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    state.window.hide().await;
    StatusCode::ACCEPTED
}

/// POST /api/window/minimize
async fn window_minimize_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    state.window.minimize().await;
    StatusCode::ACCEPTED
}

/// POST /api/window/drag
async fn window_drag_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    state.window.drag_move().await;
    StatusCode::ACCEPTED
}
