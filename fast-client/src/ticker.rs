//! Elapsed-time ticker task.
//!
//! Drives [`onefast_core::TickerState`] from a session subscription and a
//! periodic cadence, publishing elapsed milliseconds on a watch channel.
//! A single task owns both inputs, so a session change and a tick can never
//! race each other.

use crate::store::SessionSubscription;
use onefast_core::{Clock, TickAction, TickInput, TickerState};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Live elapsed-time readout for the current fast.
///
/// Emits `0` whenever no valid fast is open. Dropping the ticker stops it.
pub struct ElapsedTimeTicker {
    output: watch::Receiver<i64>,
    task: JoinHandle<()>,
}

impl ElapsedTimeTicker {
    /// Start ticking every `period` while a fast is open.
    pub fn spawn(
        mut input: SessionSubscription,
        clock: impl Clock + 'static,
        period: Duration,
    ) -> Self {
        let period = period.max(Duration::from_millis(1));
        let (tx, output) = watch::channel(0i64);

        let task = tokio::spawn(async move {
            let mut state = TickerState::new();
            let mut cadence: Option<Interval> = None;

            loop {
                tokio::select! {
                    update = input.next() => {
                        let session = match update {
                            Some(Ok(session)) => session,
                            Some(Err(e)) => {
                                warn!(error = %e, "ticker input failed, keeping current state");
                                continue;
                            }
                            None => break,
                        };

                        let (next, actions) =
                            state.on_input(TickInput::from(&session), clock.now_millis());
                        state = next;
                        for action in actions {
                            match action {
                                TickAction::Emit { elapsed_millis } => {
                                    tx.send_replace(elapsed_millis);
                                }
                                TickAction::RestartCadence => {
                                    cadence = Some(start_cadence(period));
                                }
                                TickAction::StopCadence => cadence = None,
                            }
                        }
                    }
                    _ = next_tick(&mut cadence) => {
                        if let Some(elapsed_millis) = state.on_tick(clock.now_millis()) {
                            tx.send_replace(elapsed_millis);
                        }
                    }
                }
            }
            debug!("ticker input closed");
        });

        Self { output, task }
    }

    /// A receiver that sees every published elapsed value.
    pub fn subscribe(&self) -> watch::Receiver<i64> {
        self.output.clone()
    }

    /// The most recently published elapsed value.
    pub fn current(&self) -> i64 {
        *self.output.borrow()
    }

    /// Stop the ticker.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for ElapsedTimeTicker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn start_cadence(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn next_tick(cadence: &mut Option<Interval>) {
    match cadence {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
