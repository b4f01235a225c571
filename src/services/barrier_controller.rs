//! Barrier controller - background task owning the barrier and its countdown
//!
//! This task is the only writer of `BarrierState` and `ClosingCountdown`.
//! Everyone else goes through a `BarrierHandle`: commands travel over an mpsc
//! channel and are applied between polling ticks, so an open-and-reset can
//! never interleave with a countdown evaluation. The latest state is also
//! published on a watch channel for lock-free reads.

use crate::infra::metrics::Metrics;
use crate::io::hardware::BreakBeam;
use crate::services::barrier::BarrierActuator;
use crate::services::countdown::{ClosingCountdown, CountdownAction};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Consistent view of the barrier and its countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BarrierSnapshot {
    pub is_open: bool,
    pub opened_at: Option<Instant>,
    pub countdown_active: bool,
}

#[derive(Debug, Error)]
pub enum BarrierError {
    #[error("barrier controller is not running")]
    ControllerStopped,
}

/// Requests accepted by the controller
#[derive(Debug)]
pub enum BarrierCommand {
    /// Open the barrier and restart closing timing from this moment
    OpenForEntry { reply: oneshot::Sender<BarrierSnapshot> },
    Snapshot { reply: oneshot::Sender<BarrierSnapshot> },
}

/// Cloneable client side of the controller
#[derive(Clone)]
pub struct BarrierHandle {
    cmd_tx: mpsc::Sender<BarrierCommand>,
    state_rx: watch::Receiver<BarrierSnapshot>,
}

impl BarrierHandle {
    async fn request(
        &self,
        make: impl FnOnce(oneshot::Sender<BarrierSnapshot>) -> BarrierCommand,
    ) -> Result<BarrierSnapshot, BarrierError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx.send(make(reply_tx)).await.map_err(|_| BarrierError::ControllerStopped)?;
        reply_rx.await.map_err(|_| BarrierError::ControllerStopped)
    }

    pub async fn open_for_entry(&self) -> Result<BarrierSnapshot, BarrierError> {
        self.request(|reply| BarrierCommand::OpenForEntry { reply }).await
    }

    /// Round-trip query, ordered after any command already sent
    pub async fn query(&self) -> Result<BarrierSnapshot, BarrierError> {
        self.request(|reply| BarrierCommand::Snapshot { reply }).await
    }

    /// Last published state
    pub fn snapshot(&self) -> BarrierSnapshot {
        *self.state_rx.borrow()
    }
}

pub struct BarrierController {
    actuator: BarrierActuator,
    beam: Arc<dyn BreakBeam>,
    countdown: ClosingCountdown,
    transition_delay: Duration,
    poll_interval: Duration,
    cmd_rx: mpsc::Receiver<BarrierCommand>,
    state_tx: watch::Sender<BarrierSnapshot>,
    metrics: Arc<Metrics>,
}

impl BarrierController {
    /// Run until shutdown, polling the break-beam every `poll_interval`
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut commands_open = true;

        info!(
            poll_interval_ms = %self.poll_interval.as_millis(),
            transition_delay_ms = %self.transition_delay.as_millis(),
            "barrier_controller_started"
        );

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                cmd = self.cmd_rx.recv(), if commands_open => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd, Instant::now()),
                        None => {
                            // Handles gone: keep closing autonomously
                            warn!("barrier_command_channel_closed");
                            commands_open = false;
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.poll(Instant::now());
                }
            }
        }

        info!("barrier_controller_stopped");
    }

    pub fn handle_command(&mut self, cmd: BarrierCommand, now: Instant) {
        match cmd {
            BarrierCommand::OpenForEntry { reply } => {
                let was_open = self.actuator.is_open();
                self.actuator.open(now);
                self.countdown.reset();
                self.metrics.record_barrier_open();
                debug!(was_open = %was_open, "barrier_open_for_entry");
                let _ = reply.send(self.publish());
            }
            BarrierCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    /// One obstruction-monitor tick
    pub fn poll(&mut self, now: Instant) -> CountdownAction {
        let beam_clear = !self.beam.is_interrupted();
        let was_active = self.countdown.is_active();
        let action =
            self.countdown.evaluate(self.actuator.is_open(), beam_clear, now, self.transition_delay);

        match action {
            CountdownAction::Expired => {
                self.actuator.close();
                self.metrics.record_barrier_close();
                info!(
                    clear_for_ms = %self.transition_delay.as_millis(),
                    "barrier_auto_closed"
                );
            }
            CountdownAction::Started => {
                debug!("closing_countdown_started");
            }
            CountdownAction::Cancelled => {
                self.metrics.record_countdown_cancelled();
                debug!(beam_clear = %beam_clear, "closing_countdown_cancelled");
            }
            CountdownAction::Idle | CountdownAction::Running { .. } => {}
        }

        if was_active != self.countdown.is_active() || action == CountdownAction::Expired {
            self.publish();
        }
        action
    }

    pub fn snapshot(&self) -> BarrierSnapshot {
        let state = self.actuator.state();
        BarrierSnapshot {
            is_open: state.is_open,
            opened_at: state.opened_at,
            countdown_active: self.countdown.is_active(),
        }
    }

    fn publish(&self) -> BarrierSnapshot {
        let snapshot = self.snapshot();
        self.state_tx.send_replace(snapshot);
        snapshot
    }
}

/// Create the controller and its handle.
///
/// The barrier is commanded closed immediately so the arm position matches
/// the initial state. Returns the handle (for the access flow) and the
/// controller (to be spawned).
pub fn create_barrier_controller(
    mut actuator: BarrierActuator,
    beam: Arc<dyn BreakBeam>,
    transition_delay: Duration,
    poll_interval: Duration,
    metrics: Arc<Metrics>,
    buffer_size: usize,
) -> (BarrierHandle, BarrierController) {
    actuator.close();

    let (cmd_tx, cmd_rx) = mpsc::channel(buffer_size);
    let (state_tx, state_rx) = watch::channel(BarrierSnapshot::default());

    let controller = BarrierController {
        actuator,
        beam,
        countdown: ClosingCountdown::new(),
        transition_delay,
        poll_interval,
        cmd_rx,
        state_tx,
        metrics,
    };
    controller.publish();

    (BarrierHandle { cmd_tx, state_rx }, controller)
}
