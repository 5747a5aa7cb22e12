//! Runs a [`WindowController`] on its own task, driven by host game and
//! hotkey events and by commands from the bridge.

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{WindowController, WindowVisibilityState};
use crate::host::Hotkeys;

enum Command {
    Show,
    Hide,
    Minimize,
    DragMove,
    Shutdown,
}

/// Cloneable control surface of a running window controller.
#[derive(Clone)]
pub struct WindowHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<WindowVisibilityState>,
}

impl WindowHandle {
    /// Show the overlay and clear a manual hide.
    pub async fn show(&self) {
        self.send(Command::Show).await;
    }

    /// Hide the overlay until the user shows it or the next game launches.
    pub async fn hide(&self) {
        self.send(Command::Hide).await;
    }

    pub async fn minimize(&self) {
        self.send(Command::Minimize).await;
    }

    pub async fn drag_move(&self) {
        self.send(Command::DragMove).await;
    }

    /// Close the overlay window and stop the controller.
    pub async fn shutdown(&self) {
        self.send(Command::Shutdown).await;
    }

    pub fn snapshot(&self) -> WindowVisibilityState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WindowVisibilityState> {
        self.state.clone()
    }

    async fn send(&self, cmd: Command) -> bool {
        if self.commands.send(cmd).await.is_err() {
            warn!("Window controller is not running");
            return false;
        }
        true
    }
}

/// Run `controller` on its own task. `toggle_hotkey` flips the overlay.
pub fn spawn(
    controller: WindowController,
    hotkeys: Arc<dyn Hotkeys>,
    toggle_hotkey: String,
) -> (WindowHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(32);
    let handle = WindowHandle {
        commands: tx,
        state: controller.subscribe(),
    };
    let task = tokio::spawn(run(controller, hotkeys, toggle_hotkey, rx));
    (handle, task)
}

async fn run(
    mut controller: WindowController,
    hotkeys: Arc<dyn Hotkeys>,
    toggle_hotkey: String,
    mut commands: mpsc::Receiver<Command>,
) {
    let mut games = controller.detector.subscribe();
    let mut keys = hotkeys.subscribe_hotkeys();

    match hotkeys.binding(&toggle_hotkey).await {
        Some(binding) => info!("Toggle hotkey '{}' bound to {}", toggle_hotkey, binding),
        None => warn!("Hotkey '{}' has no binding", toggle_hotkey),
    }

    controller.initialize().await;

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(Command::Show) => controller.show().await,
                Some(Command::Hide) => controller.hide().await,
                Some(Command::Minimize) => controller.minimize().await,
                Some(Command::DragMove) => controller.drag_move().await,
                Some(Command::Shutdown) | None => {
                    controller.close().await;
                    break;
                }
            },
            update = games.recv() => match update {
                Ok(update) => controller.on_game_info_updated(update).await,
                Err(RecvError::Lagged(n)) => {
                    warn!("Missed {} game info updates, re-checking running game", n);
                    controller.check_running_game().await;
                }
                Err(RecvError::Closed) => break,
            },
            pressed = keys.recv() => match pressed {
                Ok(key) if key.name == toggle_hotkey => controller.toggle().await,
                Ok(key) => debug!("Hotkey pressed: {}", key.name),
                Err(RecvError::Lagged(n)) => warn!("Missed {} hotkey presses", n),
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!("Window controller stopped");
}

#[cfg(test)]
mod tests {
    use super::super::tests::{controller, game, host, TOGGLE, WINDOW};
    use super::*;
    use crate::host::{LocalHost, WindowState};
    use std::time::Duration;

    async fn wait_for(h: &LocalHost, want: WindowState) -> bool {
        for _ in 0..100 {
            if h.state_of(WINDOW) == Some(want) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_reacts_to_host_events() {
        let h = host();
        let (handle, task) = spawn(controller(&h), h.clone(), TOGGLE.to_string());
        let mut watcher = handle.subscribe();

        // window obtained once initialize has run
        watcher.changed().await.unwrap();

        h.report_game(game(54261, true));
        assert!(wait_for(&h, WindowState::Normal).await);

        h.press_hotkey("some_other_hotkey");
        h.press_hotkey(TOGGLE);
        assert!(wait_for(&h, WindowState::Hidden).await);
        watcher.changed().await.unwrap();
        assert!(watcher.borrow().is_manually_hidden);

        h.press_hotkey(TOGGLE);
        assert!(wait_for(&h, WindowState::Normal).await);

        handle.shutdown().await;
        task.await.unwrap();
        assert_eq!(h.state_of(WINDOW), Some(WindowState::Closed));
    }

    #[tokio::test]
    async fn test_commands_drive_window() {
        let h = host();
        let (handle, task) = spawn(controller(&h), h.clone(), TOGGLE.to_string());
        h.report_game(game(54261, true));
        assert!(wait_for(&h, WindowState::Normal).await);

        handle.hide().await;
        assert!(wait_for(&h, WindowState::Hidden).await);
        assert!(handle.snapshot().is_manually_hidden);

        // a repeated running update keeps the manual hide
        h.report_game(game(54261, true));
        handle.minimize().await;
        assert!(wait_for(&h, WindowState::Minimized).await);
        assert!(handle.snapshot().is_manually_hidden);

        handle.show().await;
        assert!(wait_for(&h, WindowState::Normal).await);
        assert!(!handle.snapshot().is_manually_hidden);

        drop(handle);
        task.await.unwrap();
        assert_eq!(h.state_of(WINDOW), Some(WindowState::Closed));
    }
}
