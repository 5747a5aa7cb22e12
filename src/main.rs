use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

mod api;
mod backend;
mod config;
mod error;
mod host;
mod models;
mod poller;
mod telemetry;
mod window;

#[cfg(test)]
mod test_support;

use api::AppState;
use backend::BackendClient;
use config::Config;
use host::LocalHost;
use poller::{ParticipantPoller, PollerEvent};
use telemetry::LiveClientData;
use window::WindowController;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;
    info!("=== Overlay core starting ===");

    let telemetry = LiveClientData::new(&config.telemetry_url, config.telemetry_timeout())?;
    let backend = BackendClient::new(&config.backend_url, config.backend_timeout())?;

    if backend.is_backend_available().await {
        info!("Backend reachable at {}", config.backend_url);
    } else {
        warn!(
            "Backend at {} is not reachable; participant lookups will fail until it is",
            config.backend_url
        );
    }

    let host = Arc::new(LocalHost::new(
        &[config.overlay_window.as_str()],
        [(config.toggle_hotkey.clone(), config.toggle_binding.clone())],
    ));

    // Participant poller on its own task
    let (event_tx, mut event_rx) = mpsc::channel(16);
    let participant_poller = ParticipantPoller::new(
        config.poller(),
        Arc::new(telemetry.clone()),
        Arc::new(backend.clone()),
        event_tx,
    );
    let (poller_handle, poller_task) = poller::spawn(participant_poller);

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                PollerEvent::GameStarted(participants) => {
                    info!("Game started with {} participants", participants.len())
                }
                PollerEvent::GameEnded => info!("Game ended"),
            }
        }
    });

    // Window controller driven by host game and hotkey events
    let controller = WindowController::new(
        host.clone(),
        host.clone(),
        config.overlay_window.clone(),
        config.supported_games.clone(),
    );
    let (window_handle, window_task) =
        window::spawn(controller, host.clone(), config.toggle_hotkey.clone());

    let state = AppState {
        poller: poller_handle.clone(),
        telemetry,
        backend,
        retry: config.retry(),
        host: host.clone(),
        window: window_handle.clone(),
    };
    let app = api::router(state);
    let addr: SocketAddr = config.api_addr.parse()?;
    info!("Bridge API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    // Run the bridge until Ctrl-C
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutdown requested");
        })
        .await?;

    poller_handle.shutdown().await;
    if let Err(e) = poller_task.await {
        warn!("Participant poller task failed: {}", e);
    }
    window_handle.shutdown().await;
    if let Err(e) = window_task.await {
        warn!("Window controller task failed: {}", e);
    }

    info!("=== Overlay core stopped ===");
    Ok(())
}
