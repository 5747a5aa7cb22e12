use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::debug;

use super::{
    GameDetector, GameInfoUpdate, HotkeyPressed, Hotkeys, OverlayWindows, RunningGameInfo,
    WindowId, WindowState,
};
use crate::error::HostError;

struct LocalWindow {
    name: String,
    state: WindowState,
}

/// In-process host. The overlay front-end embedded in the real host platform
/// forwards game and hotkey events here through the bridge API; window
/// operations are recorded so the front-end can mirror them.
pub struct LocalHost {
    windows: Mutex<HashMap<WindowId, LocalWindow>>,
    game: Mutex<Option<RunningGameInfo>>,
    game_tx: broadcast::Sender<GameInfoUpdate>,
    hotkey_tx: broadcast::Sender<HotkeyPressed>,
    bindings: HashMap<String, String>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LocalHost {
    pub fn new<I>(declared_windows: &[&str], bindings: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let windows = declared_windows
            .iter()
            .map(|name| {
                (
                    window_id(name),
                    LocalWindow {
                        name: name.to_string(),
                        state: WindowState::Closed,
                    },
                )
            })
            .collect();
        let (game_tx, _) = broadcast::channel(64);
        let (hotkey_tx, _) = broadcast::channel(64);
        LocalHost {
            windows: Mutex::new(windows),
            game: Mutex::new(None),
            game_tx,
            hotkey_tx,
            bindings: bindings.into_iter().collect(),
        }
    }

    /// Record the host's latest game info and notify subscribers.
    pub fn report_game(&self, info: RunningGameInfo) -> GameInfoUpdate {
        let update = {
            let mut current = lock(&self.game);
            let was_running = current.as_ref().map_or(false, |g| g.is_running);
            let update = GameInfoUpdate {
                running_changed: was_running != info.is_running,
                game_info: Some(info.clone()),
            };
            *current = Some(info);
            update
        };
        if self.game_tx.send(update.clone()).is_err() {
            debug!("No game info subscribers");
        }
        update
    }

    pub fn press_hotkey(&self, name: &str) {
        let pressed = HotkeyPressed {
            name: name.to_string(),
        };
        if self.hotkey_tx.send(pressed).is_err() {
            debug!("No hotkey subscribers for {}", name);
        }
    }

    /// State of the declared window called `name`.
    pub fn state_of(&self, name: &str) -> Option<WindowState> {
        lock(&self.windows)
            .values()
            .find(|w| w.name == name)
            .map(|w| w.state)
    }

    fn set_state(&self, id: &WindowId, state: WindowState) -> Result<(), HostError> {
        let mut windows = lock(&self.windows);
        let window = windows
            .get_mut(id)
            .ok_or_else(|| HostError::UnknownWindow(id.to_string()))?;
        debug!("Window {} -> {:?}", window.name, state);
        window.state = state;
        Ok(())
    }
}

fn window_id(name: &str) -> WindowId {
    WindowId(format!("Window_Extension_{}", name))
}

#[async_trait]
impl OverlayWindows for LocalHost {
    async fn obtain_declared_window(&self, name: &str) -> Result<WindowId, HostError> {
        let id = window_id(name);
        if lock(&self.windows).contains_key(&id) {
            Ok(id)
        } else {
            Err(HostError::UnknownWindow(name.to_string()))
        }
    }

    async fn restore(&self, id: &WindowId) -> Result<(), HostError> {
        self.set_state(id, WindowState::Normal)
    }

    async fn hide(&self, id: &WindowId) -> Result<(), HostError> {
        self.set_state(id, WindowState::Hidden)
    }

    async fn minimize(&self, id: &WindowId) -> Result<(), HostError> {
        self.set_state(id, WindowState::Minimized)
    }

    // The drag itself happens in the front-end; only the target is checked.
    async fn drag_move(&self, id: &WindowId) -> Result<(), HostError> {
        let windows = lock(&self.windows);
        let window = windows
            .get(id)
            .ok_or_else(|| HostError::UnknownWindow(id.to_string()))?;
        debug!("Window {} drag requested", window.name);
        Ok(())
    }

    async fn close(&self, id: &WindowId) -> Result<(), HostError> {
        self.set_state(id, WindowState::Closed)
    }

    async fn window_state(&self, id: &WindowId) -> Result<WindowState, HostError> {
        lock(&self.windows)
            .get(id)
            .map(|w| w.state)
            .ok_or_else(|| HostError::UnknownWindow(id.to_string()))
    }
}

#[async_trait]
impl GameDetector for LocalHost {
    fn subscribe(&self) -> broadcast::Receiver<GameInfoUpdate> {
        self.game_tx.subscribe()
    }

    async fn running_game_info(&self) -> Option<RunningGameInfo> {
        lock(&self.game).clone()
    }
}

#[async_trait]
impl Hotkeys for LocalHost {
    fn subscribe_hotkeys(&self) -> broadcast::Receiver<HotkeyPressed> {
        self.hotkey_tx.subscribe()
    }

    async fn binding(&self, name: &str) -> Option<String> {
        self.bindings.get(name).cloned()
    }
}
