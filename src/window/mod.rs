//! Shows and hides the overlay window as the game starts and stops, and on the
//! toggle hotkey. A manual hide sticks until the next game launch.

pub mod games;
mod task;

pub use games::is_supported_game;
pub use task::{spawn, WindowHandle};

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::host::{GameDetector, GameInfoUpdate, OverlayWindows, RunningGameInfo, WindowId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowVisibilityState {
    pub is_manually_hidden: bool,
    pub window_id: Option<WindowId>,
}

pub struct WindowController {
    windows: Arc<dyn OverlayWindows>,
    detector: Arc<dyn GameDetector>,
    window_name: String,
    supported_games: Vec<u32>,
    state: WindowVisibilityState,
    state_tx: watch::Sender<WindowVisibilityState>,
}

impl WindowController {
    pub fn new(
        windows: Arc<dyn OverlayWindows>,
        detector: Arc<dyn GameDetector>,
        window_name: impl Into<String>,
        supported_games: Vec<u32>,
    ) -> Self {
        let (state_tx, _) = watch::channel(WindowVisibilityState::default());
        WindowController {
            windows,
            detector,
            window_name: window_name.into(),
            supported_games,
            state: WindowVisibilityState::default(),
            state_tx,
        }
    }

    pub fn state(&self) -> &WindowVisibilityState {
        &self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<WindowVisibilityState> {
        self.state_tx.subscribe()
    }

    /// Obtain the overlay window and show it if the game is already running.
    pub async fn initialize(&mut self) {
        info!("Initializing window controller for '{}'", self.window_name);
        self.obtain_window().await;
        self.check_running_game().await;
    }

    pub async fn check_running_game(&mut self) {
        match self.detector.running_game_info().await {
            Some(info) if info.is_running && self.is_supported(&info) => {
                info!("Game already running (id={})", info.id);
                self.handle_game_launched(info).await;
            }
            Some(_) => debug!("No supported game running"),
            None => debug!("No running game found"),
        }
    }

    pub async fn on_game_info_updated(&mut self, update: GameInfoUpdate) {
        let Some(info) = update.game_info else {
            debug!("Game info updated: no game info");
            return;
        };
        debug!(
            "Game info updated (id={}, running={}, running_changed={})",
            info.id, info.is_running, update.running_changed
        );
        if !update.running_changed {
            return;
        }

        // The event may be stale; ask the host what is running now.
        match self.detector.running_game_info().await {
            Some(current) if current.is_running => self.handle_game_launched(current).await,
            _ => self.handle_game_closed().await,
        }
    }

    pub async fn handle_game_launched(&mut self, info: RunningGameInfo) {
        if !self.is_supported(&info) {
            debug!("Game launched but not supported: {}", info.id);
            return;
        }
        info!("Supported game launched (id={})", info.id);
        self.set_manually_hidden(false);
        self.launch_window().await;
    }

    /// Runs for any game that stops, supported or not; hiding an already
    /// hidden overlay is harmless.
    pub async fn handle_game_closed(&mut self) {
        info!("Game closed");
        self.set_manually_hidden(false);
        if self.state.window_id.is_some() {
            self.hide_window().await;
        }
    }

    /// Flip visibility, remembering a manual hide until the next launch.
    pub async fn toggle(&mut self) {
        let Some(id) = self.state.window_id.clone() else {
            warn!("Overlay window not available");
            return;
        };
        let window_state = match self.windows.window_state(&id).await {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to get window state: {}", e);
                return;
            }
        };
        debug!("Toggling overlay window (currently {:?})", window_state);

        if window_state.is_visible() {
            self.hide().await;
        } else {
            self.show().await;
        }
    }

    /// Hide on request. Game info updates leave it hidden until the next launch.
    pub async fn hide(&mut self) {
        self.set_manually_hidden(true);
        self.hide_window().await;
    }

    /// Show on request, clearing any manual hide.
    pub async fn show(&mut self) {
        self.set_manually_hidden(false);
        self.launch_window().await;
    }

    pub async fn minimize(&mut self) {
        let Some(id) = &self.state.window_id else {
            warn!("Overlay window not available");
            return;
        };
        match self.windows.minimize(id).await {
            Ok(()) => info!("Overlay window minimized"),
            Err(e) => error!("Failed to minimize overlay window: {}", e),
        }
    }

    pub async fn drag_move(&mut self) {
        let Some(id) = &self.state.window_id else {
            warn!("Overlay window not available");
            return;
        };
        if let Err(e) = self.windows.drag_move(id).await {
            error!("Failed to start window drag: {}", e);
        }
    }

    pub async fn close(&mut self) {
        if let Some(id) = &self.state.window_id {
            match self.windows.close(id).await {
                Ok(()) => info!("Overlay window closed"),
                Err(e) => error!("Failed to close overlay window: {}", e),
            }
        }
    }

    fn is_supported(&self, info: &RunningGameInfo) -> bool {
        is_supported_game(info.id, &self.supported_games)
    }

    async fn obtain_window(&mut self) -> Option<WindowId> {
        match self.windows.obtain_declared_window(&self.window_name).await {
            Ok(id) => {
                info!("Overlay window obtained: {}", id);
                self.state.window_id = Some(id.clone());
                self.publish();
                Some(id)
            }
            Err(e) => {
                error!("Failed to obtain overlay window: {}", e);
                None
            }
        }
    }

    async fn launch_window(&mut self) {
        let id = match self.state.window_id.clone() {
            Some(id) => id,
            None => {
                warn!("Overlay window not available, attempting to obtain it");
                match self.obtain_window().await {
                    Some(id) => id,
                    None => return,
                }
            }
        };
        if self.state.is_manually_hidden {
            debug!("Overlay window manually hidden, skipping auto-launch");
            return;
        }
        match self.windows.restore(&id).await {
            Ok(()) => info!("Overlay window shown"),
            Err(e) => error!("Failed to restore overlay window: {}", e),
        }
    }

    async fn hide_window(&mut self) {
        let Some(id) = &self.state.window_id else {
            warn!("Overlay window not available");
            return;
        };
        match self.windows.hide(id).await {
            Ok(()) => info!("Overlay window hidden"),
            Err(e) => error!("Failed to hide overlay window: {}", e),
        }
    }

    fn set_manually_hidden(&mut self, hidden: bool) {
        if self.state.is_manually_hidden != hidden {
            self.state.is_manually_hidden = hidden;
            self.publish();
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{LocalHost, WindowState};

    pub(super) const WINDOW: &str = "in_game";
    pub(super) const TOGGLE: &str = "show_hide_in_game";

    pub(super) fn host() -> Arc<LocalHost> {
        Arc::new(LocalHost::new(
            &[WINDOW],
            [(TOGGLE.to_string(), "Ctrl+Tab".to_string())],
        ))
    }

    pub(super) fn controller(host: &Arc<LocalHost>) -> WindowController {
        WindowController::new(host.clone(), host.clone(), WINDOW, vec![5426, 10902])
    }

    pub(super) fn game(id: u32, running: bool) -> RunningGameInfo {
        RunningGameInfo {
            id,
            is_running: running,
            title: None,
        }
    }

    #[tokio::test]
    async fn test_launch_toggle_repeat_close() {
        let h = host();
        let mut c = controller(&h);
        c.initialize().await;
        assert_eq!(h.state_of(WINDOW), Some(WindowState::Closed));

        c.on_game_info_updated(h.report_game(game(5426, true))).await;
        assert_eq!(h.state_of(WINDOW), Some(WindowState::Normal));
        assert!(!c.state().is_manually_hidden);

        c.toggle().await;
        assert_eq!(h.state_of(WINDOW), Some(WindowState::Hidden));
        assert!(c.state().is_manually_hidden);

        // same running game again: manual hide is kept
        c.on_game_info_updated(h.report_game(game(5426, true))).await;
        assert_eq!(h.state_of(WINDOW), Some(WindowState::Hidden));
        assert!(c.state().is_manually_hidden);

        c.on_game_info_updated(h.report_game(game(5426, false))).await;
        assert_eq!(h.state_of(WINDOW), Some(WindowState::Hidden));
        assert!(!c.state().is_manually_hidden);
    }

    #[tokio::test]
    async fn test_toggle_from_hidden_shows_and_clears_flag() {
        let h = host();
        let mut c = controller(&h);
        c.initialize().await;
        c.on_game_info_updated(h.report_game(game(54261, true))).await;

        c.toggle().await;
        c.toggle().await;
        assert_eq!(h.state_of(WINDOW), Some(WindowState::Normal));
        assert!(!c.state().is_manually_hidden);
    }

    #[tokio::test]
    async fn test_new_launch_overrides_previous_manual_hide() {
        let h = host();
        let mut c = controller(&h);
        c.initialize().await;
        c.on_game_info_updated(h.report_game(game(54261, true))).await;
        c.toggle().await;

        c.on_game_info_updated(h.report_game(game(54261, false))).await;
        c.on_game_info_updated(h.report_game(game(54261, true))).await;
        assert_eq!(h.state_of(WINDOW), Some(WindowState::Normal));
    }

    #[tokio::test]
    async fn test_unsupported_game_is_ignored() {
        let h = host();
        let mut c = controller(&h);
        c.initialize().await;
        c.on_game_info_updated(h.report_game(game(21640, true))).await;
        assert_eq!(h.state_of(WINDOW), Some(WindowState::Closed));
    }

    #[tokio::test]
    async fn test_already_running_game_shows_on_initialize() {
        let h = host();
        h.report_game(game(109021, true));
        let mut c = controller(&h);
        c.initialize().await;
        assert_eq!(h.state_of(WINDOW), Some(WindowState::Normal));
        assert!(c.state().window_id.is_some());
    }

    #[tokio::test]
    async fn test_missing_window_is_obtained_on_launch() {
        let h = host();
        let mut c = controller(&h);
        c.handle_game_launched(game(54261, true)).await;
        assert!(c.state().window_id.is_some());
        assert_eq!(h.state_of(WINDOW), Some(WindowState::Normal));
    }

    #[tokio::test]
    async fn test_undeclared_window_leaves_controller_inert() {
        let h = host();
        let mut c = WindowController::new(h.clone(), h.clone(), "desktop", vec![5426]);
        c.initialize().await;
        c.handle_game_launched(game(54261, true)).await;
        c.toggle().await;
        assert_eq!(c.state().window_id, None);
        assert_eq!(h.state_of(WINDOW), Some(WindowState::Closed));
    }

    #[tokio::test]
    async fn test_button_hide_survives_game_updates_until_next_launch() {
        let h = host();
        let mut c = controller(&h);
        c.initialize().await;
        c.on_game_info_updated(h.report_game(game(54261, true))).await;

        c.hide().await;
        assert_eq!(h.state_of(WINDOW), Some(WindowState::Hidden));
        assert!(c.state().is_manually_hidden);

        c.on_game_info_updated(h.report_game(game(54261, true))).await;
        assert_eq!(h.state_of(WINDOW), Some(WindowState::Hidden));
        assert!(c.state().is_manually_hidden);

        c.on_game_info_updated(h.report_game(game(54261, false))).await;
        c.on_game_info_updated(h.report_game(game(54261, true))).await;
        assert_eq!(h.state_of(WINDOW), Some(WindowState::Normal));
        assert!(!c.state().is_manually_hidden);
    }

    #[tokio::test]
    async fn test_show_clears_manual_hide() {
        let h = host();
        let mut c = controller(&h);
        c.initialize().await;
        c.hide().await;
        assert!(c.state().is_manually_hidden);

        c.show().await;
        assert_eq!(h.state_of(WINDOW), Some(WindowState::Normal));
        assert!(!c.state().is_manually_hidden);
    }

    #[tokio::test]
    async fn test_minimize_keeps_manual_flag() {
        let h = host();
        let mut c = controller(&h);
        c.initialize().await;
        c.show().await;

        c.minimize().await;
        c.drag_move().await;
        assert_eq!(h.state_of(WINDOW), Some(WindowState::Minimized));
        assert!(!c.state().is_manually_hidden);

        // minimized counts as not visible, so the hotkey brings it back
        c.toggle().await;
        assert_eq!(h.state_of(WINDOW), Some(WindowState::Normal));
    }
}
