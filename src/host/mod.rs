//! Capabilities borrowed from the host platform: declared windows, game
//! detection and hotkeys. The overlay core only sees these traits.

pub mod local;

pub use local::LocalHost;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

use crate::error::HostError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(pub String);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowState {
    Normal,
    Minimized,
    Maximized,
    Closed,
    Hidden,
}

impl WindowState {
    pub fn is_visible(self) -> bool {
        matches!(self, WindowState::Normal | WindowState::Maximized)
    }
}

/// What the host knows about the currently detected game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningGameInfo {
    pub id: u32,
    pub is_running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInfoUpdate {
    pub game_info: Option<RunningGameInfo>,
    /// The running flag flipped with this update.
    pub running_changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HotkeyPressed {
    pub name: String,
}

#[async_trait]
pub trait OverlayWindows: Send + Sync {
    async fn obtain_declared_window(&self, name: &str) -> Result<WindowId, HostError>;
    async fn restore(&self, id: &WindowId) -> Result<(), HostError>;
    async fn hide(&self, id: &WindowId) -> Result<(), HostError>;
    async fn minimize(&self, id: &WindowId) -> Result<(), HostError>;
    /// Start a host-driven drag of the window with the mouse.
    async fn drag_move(&self, id: &WindowId) -> Result<(), HostError>;
    async fn close(&self, id: &WindowId) -> Result<(), HostError>;
    async fn window_state(&self, id: &WindowId) -> Result<WindowState, HostError>;
}

#[async_trait]
pub trait GameDetector: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<GameInfoUpdate>;
    async fn running_game_info(&self) -> Option<RunningGameInfo>;
}

#[async_trait]
pub trait Hotkeys: Send + Sync {
    fn subscribe_hotkeys(&self) -> broadcast::Receiver<HotkeyPressed>;
    /// Key combination bound to `name`, if any.
    async fn binding(&self, name: &str) -> Option<String>;
}
