//! Scheduling for [`ParticipantPoller`]: one task owns the machine, so fetch
//! cycles never overlap.

use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{ParticipantPoller, PollerSnapshot};

enum Command {
    Refetch,
    Reset(oneshot::Sender<()>),
    SetEnabled(bool),
    Shutdown,
}

/// Cloneable control surface of a running poller.
#[derive(Clone)]
pub struct PollerHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<PollerSnapshot>,
}

impl PollerHandle {
    /// Run one cycle now, fetching even if a roster is cached. Ignored while
    /// a cycle is already in flight or polling is disabled.
    pub async fn refetch(&self) {
        self.send(Command::Refetch).await;
    }

    /// Resolves once the state is back at baseline. Cancels an in-flight cycle.
    pub async fn reset(&self) {
        let (ack, done) = oneshot::channel();
        if self.send(Command::Reset(ack)).await {
            let _ = done.await;
        }
    }

    pub async fn set_enabled(&self, enabled: bool) {
        self.send(Command::SetEnabled(enabled)).await;
    }

    pub async fn shutdown(&self) {
        self.send(Command::Shutdown).await;
    }

    pub fn snapshot(&self) -> PollerSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollerSnapshot> {
        self.state.clone()
    }

    async fn send(&self, cmd: Command) -> bool {
        if self.commands.send(cmd).await.is_err() {
            warn!("Participant poller is not running");
            return false;
        }
        true
    }
}

/// Run `poller` on its own task.
pub fn spawn(poller: ParticipantPoller) -> (PollerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(32);
    let handle = PollerHandle {
        commands: tx,
        state: poller.subscribe(),
    };
    let task = tokio::spawn(run(poller, rx));
    (handle, task)
}

/// The recurring timer. Replaced, never retuned, when the period changes.
#[derive(Default)]
struct Schedule {
    timer: Option<Interval>,
    period: Option<Duration>,
}

impl Schedule {
    fn sync(&mut self, desired: Option<Duration>) {
        if desired == self.period {
            return;
        }
        self.period = desired;
        self.timer = desired.map(|period| {
            let mut timer = tokio::time::interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            timer
        });
        match desired {
            Some(period) => debug!("Poll timer set to {:?}", period),
            None => debug!("Poll timer cancelled"),
        }
    }

    async fn tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

async fn run(mut poller: ParticipantPoller, mut commands: mpsc::Receiver<Command>) {
    let mut schedule = Schedule::default();

    if poller.is_enabled() {
        poller.enable();
        if drive_cycle(&mut poller, &mut commands, false).await.is_break() {
            return;
        }
    } else {
        debug!("Game participants polling disabled");
    }

    loop {
        schedule.sync(poller.next_delay());

        let flow = tokio::select! {
            _ = schedule.tick() => drive_cycle(&mut poller, &mut commands, false).await,
            cmd = commands.recv() => match cmd {
                Some(Command::Refetch) if !poller.is_enabled() => {
                    debug!("Polling disabled, refetch ignored");
                    ControlFlow::Continue(())
                }
                Some(Command::Refetch) => drive_cycle(&mut poller, &mut commands, true).await,
                Some(Command::Reset(ack)) => {
                    poller.reset();
                    let _ = ack.send(());
                    ControlFlow::Continue(())
                }
                Some(Command::SetEnabled(true)) if !poller.is_enabled() => {
                    poller.enable();
                    drive_cycle(&mut poller, &mut commands, false).await
                }
                Some(Command::SetEnabled(true)) => ControlFlow::Continue(()),
                Some(Command::SetEnabled(false)) => {
                    poller.disable();
                    ControlFlow::Continue(())
                }
                Some(Command::Shutdown) | None => ControlFlow::Break(()),
            },
        };

        if flow.is_break() {
            break;
        }
    }

    info!("Participant poller stopped");
}

/// Run one cycle while still serving commands. Refetch requests that arrive
/// mid-cycle are dropped; reset, disable and shutdown cancel the cycle.
async fn drive_cycle(
    poller: &mut ParticipantPoller,
    commands: &mut mpsc::Receiver<Command>,
    force: bool,
) -> ControlFlow<()> {
    let mut interrupt = None;
    {
        let cycle = poller.run_cycle(force);
        tokio::pin!(cycle);
        loop {
            tokio::select! {
                _ = &mut cycle => break,
                cmd = commands.recv() => match cmd {
                    Some(Command::Refetch) => debug!("Fetch already in flight, refetch ignored"),
                    Some(Command::SetEnabled(true)) => {}
                    Some(other) => {
                        interrupt = Some(other);
                        break;
                    }
                    None => {
                        interrupt = Some(Command::Shutdown);
                        break;
                    }
                },
            }
        }
    }

    match interrupt {
        None => ControlFlow::Continue(()),
        Some(Command::Reset(ack)) => {
            debug!("In-flight cycle cancelled by reset");
            poller.reset();
            let _ = ack.send(());
            ControlFlow::Continue(())
        }
        Some(Command::SetEnabled(false)) => {
            poller.disable();
            ControlFlow::Continue(())
        }
        Some(Command::Shutdown) => ControlFlow::Break(()),
        Some(Command::Refetch) | Some(Command::SetEnabled(true)) => ControlFlow::Continue(()),
    }
}

#[cfg(test)]
mod tests {
    use super::super::mocks::{MockAccounts, MockTelemetry};
    use super::super::{Phase, PollerConfig, PollerEvent};
    use super::*;
    use crate::error::FetchError;
    use crate::models::fixtures::{account_with, participant};
    use crate::models::TeamId;
    use std::sync::Arc;
    use tokio::time::sleep;

    fn start(
        telemetry: &Arc<MockTelemetry>,
        accounts: &Arc<MockAccounts>,
        enabled: bool,
    ) -> (PollerHandle, JoinHandle<()>, mpsc::Receiver<PollerEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let config = PollerConfig {
            enabled,
            ..PollerConfig::default()
        };
        let poller = ParticipantPoller::new(config, telemetry.clone(), accounts.clone(), tx);
        let (handle, task) = spawn(poller);
        (handle, task, rx)
    }

    fn roster_account() -> Result<crate::models::AccountInfo, FetchError> {
        Ok(account_with(vec![
            participant("Foo", "Ahri", TeamId::Blue),
            participant("Bar", "Garen", TeamId::Red),
        ]))
    }

    #[tokio::test(start_paused = true)]
    async fn test_probes_immediately_then_on_interval() {
        let t = MockTelemetry::new(false);
        let a = MockAccounts::new(roster_account());
        let (_handle, _task, _rx) = start(&t, &a, true);

        sleep(Duration::from_millis(10)).await;
        assert_eq!(t.probes(), 1);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(t.probes(), 2);

        sleep(Duration::from_secs(120)).await;
        assert_eq!(t.probes(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_at_start_stays_idle() {
        let t = MockTelemetry::new(true);
        let a = MockAccounts::new(roster_account());
        let (handle, _task, _rx) = start(&t, &a, false);

        sleep(Duration::from_secs(600)).await;
        assert_eq!(t.probes(), 0);
        assert_eq!(handle.snapshot().phase, Phase::Idle);

        handle.set_enabled(true).await;
        sleep(Duration::from_millis(10)).await;
        assert_eq!(t.probes(), 1);
        assert_eq!(handle.snapshot().phase, Phase::CachedLive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_cancels_timer_and_reenable_restarts() {
        let t = MockTelemetry::new(false);
        let a = MockAccounts::new(roster_account());
        let (handle, _task, _rx) = start(&t, &a, true);
        sleep(Duration::from_millis(10)).await;

        handle.set_enabled(false).await;
        sleep(Duration::from_secs(600)).await;
        assert_eq!(t.probes(), 1);
        assert_eq!(handle.snapshot().phase, Phase::Idle);

        handle.set_enabled(true).await;
        sleep(Duration::from_millis(10)).await;
        assert_eq!(t.probes(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_session_switches_to_live_check_until_game_end() {
        let t = MockTelemetry::new(true);
        let a = MockAccounts::new(roster_account());
        let (handle, _task, mut rx) = start(&t, &a, true);

        sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.snapshot().phase, Phase::CachedLive);
        assert!(matches!(rx.recv().await, Some(PollerEvent::GameStarted(p)) if p.len() == 2));

        // liveness-only checks every 5s, no further backend calls
        sleep(Duration::from_secs(30)).await;
        assert_eq!(t.probes(), 7);
        assert_eq!(a.calls(), 1);

        t.set_live(false);
        sleep(Duration::from_secs(5)).await;
        assert_eq!(rx.recv().await, Some(PollerEvent::GameEnded));
        let s = handle.snapshot();
        assert!(s.participants.is_empty());
        assert_eq!(s.phase, Phase::PollingNotLive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_during_in_flight_cycle_is_ignored() {
        let t = MockTelemetry::new(true);
        let a = MockAccounts::slow(roster_account(), Duration::from_secs(2));
        let (handle, _task, _rx) = start(&t, &a, true);

        sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.snapshot().phase, Phase::Fetching);
        handle.refetch().await;
        handle.refetch().await;

        sleep(Duration::from_secs(3)).await;
        assert_eq!(a.calls(), 1);
        assert_eq!(handle.snapshot().phase, Phase::CachedLive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_when_cached_hits_backend_again() {
        let t = MockTelemetry::new(true);
        let a = MockAccounts::new(roster_account());
        let (handle, _task, _rx) = start(&t, &a, true);
        sleep(Duration::from_millis(10)).await;
        assert_eq!(a.calls(), 1);

        handle.refetch().await;
        sleep(Duration::from_millis(10)).await;
        assert_eq!(a.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_while_disabled_is_ignored() {
        let t = MockTelemetry::new(true);
        let a = MockAccounts::new(roster_account());
        let (handle, _task, _rx) = start(&t, &a, false);

        handle.refetch().await;
        sleep(Duration::from_millis(10)).await;
        assert_eq!(t.probes(), 0);
        assert_eq!(a.calls(), 0);
        let s = handle.snapshot();
        assert_eq!(s.phase, Phase::Idle);
        assert!(s.participants.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_in_flight_cycle() {
        let t = MockTelemetry::new(true);
        let a = MockAccounts::slow(roster_account(), Duration::from_secs(2));
        let (handle, _task, mut rx) = start(&t, &a, true);
        sleep(Duration::from_millis(10)).await;

        handle.reset().await;
        let s = handle.snapshot();
        assert_eq!(s.phase, Phase::PollingNotLive);
        assert!(!s.is_loading);

        sleep(Duration::from_secs(3)).await;
        assert!(handle.snapshot().participants.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_task() {
        let t = MockTelemetry::new(false);
        let a = MockAccounts::new(roster_account());
        let (handle, task, _rx) = start(&t, &a, true);
        sleep(Duration::from_millis(10)).await;

        handle.shutdown().await;
        task.await.unwrap();

        sleep(Duration::from_secs(600)).await;
        assert_eq!(t.probes(), 1);
    }
}
