//! Two-phase idle detection.
//!
//! ```text
//!   idle            idle
//! Active ──► Suspect ──► Stopped (stop invoked once)
//!   ▲           │
//!   └── busy ───┘
//! ```
//!
//! A single idle sample is not enough: work may be in transit between a
//! worker and the writer. Two consecutive idle samples are.

use std::time::Duration;

use crate::lifecycle::{Shutdown, StopReason, Stopper};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Active,
    Suspect,
    Stopped,
}

#[derive(Debug)]
pub struct IdleWatchdog {
    state: WatchdogState,
}

impl IdleWatchdog {
    pub fn new() -> Self {
        Self {
            state: WatchdogState::Active,
        }
    }

    pub fn state(&self) -> WatchdogState {
        self.state
    }

    /// Feed one sample of pending work. Returns `true` exactly once: on the
    /// transition into `Stopped`.
    pub fn observe(&mut self, pending: usize) -> bool {
        let idle = pending == 0;
        match (self.state, idle) {
            (WatchdogState::Stopped, _) => false,
            (WatchdogState::Active, true) => {
                tracing::info!("no pending work, will stop if still idle on next check");
                self.state = WatchdogState::Suspect;
                false
            }
            (WatchdogState::Suspect, true) => {
                tracing::info!("still no pending work, stopping");
                self.state = WatchdogState::Stopped;
                true
            }
            (WatchdogState::Suspect, false) => {
                tracing::info!(pending, "work resumed, not stopping");
                self.state = WatchdogState::Active;
                false
            }
            (WatchdogState::Active, false) => {
                tracing::debug!(pending, "crawl busy");
                false
            }
        }
    }
}

impl Default for IdleWatchdog {
    fn default() -> Self {
        Self::new()
    }
}

/// Sample `probe` after `grace`, then every `period`, until the watchdog
/// stops the pipeline or shutdown arrives from elsewhere.
pub(crate) async fn run<P>(
    probe: P,
    grace: Duration,
    period: Duration,
    stopper: Stopper,
    shutdown: Shutdown,
) where
    P: Fn() -> usize + Send + 'static,
{
    tokio::select! {
        _ = shutdown.triggered() => return,
        _ = tokio::time::sleep(grace) => {}
    }

    let mut watchdog = IdleWatchdog::new();
    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = shutdown.triggered() => break,
            _ = ticker.tick() => {
                if watchdog.observe(probe()) {
                    stopper.stop(StopReason::Quiescent);
                    break;
                }
            }
        }
    }
    tracing::debug!("watchdog exited");
}
