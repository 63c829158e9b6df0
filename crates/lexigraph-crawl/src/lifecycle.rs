//! Pipeline lifecycle and the shared stop contract.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Broadcast shutdown flag. Every blocking wait in the pipeline selects on it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Returns `true` if this call flipped the flag.
    pub fn trigger(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the flag is set.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as any clone of `self`, so an error here
        // cannot outlive the flag.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Created = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PipelineState::Created,
            1 => PipelineState::Running,
            2 => PipelineState::Stopping,
            _ => PipelineState::Stopped,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Created => "created",
            PipelineState::Running => "running",
            PipelineState::Stopping => "stopping",
            PipelineState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The idle watchdog saw no pending work twice in a row.
    Quiescent,
    /// External interrupt (ctrl-c or an embedding application).
    Interrupted,
    /// A lookup failed in a way no retry can fix.
    Fatal(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Quiescent => f.write_str("quiescent"),
            StopReason::Interrupted => f.write_str("interrupted"),
            StopReason::Fatal(msg) => write!(f, "fatal: {}", msg),
        }
    }
}

#[derive(Debug)]
struct Lifecycle {
    state: AtomicU8,
    reason: parking_lot::Mutex<Option<StopReason>>,
    shutdown: Shutdown,
}

/// Handle to stop a pipeline. Cheap to clone, safe to call from any task.
#[derive(Debug, Clone)]
pub struct Stopper {
    inner: Arc<Lifecycle>,
}

impl Stopper {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Lifecycle {
                state: AtomicU8::new(PipelineState::Created as u8),
                reason: parking_lot::Mutex::new(None),
                shutdown: Shutdown::new(),
            }),
        }
    }

    /// Request shutdown. Only the first call has any effect; returns whether
    /// this call was it.
    pub fn stop(&self, reason: StopReason) -> bool {
        // Held across the transition so `Stopping` is never visible without a reason.
        let mut recorded = self.inner.reason.lock();
        let mut current = self.inner.state.load(Ordering::Acquire);
        loop {
            let state = PipelineState::from_u8(current);
            if matches!(state, PipelineState::Stopping | PipelineState::Stopped) {
                tracing::debug!(state = %state, reason = %reason, "stop already requested");
                return false;
            }
            match self.inner.state.compare_exchange(
                current,
                PipelineState::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }

        tracing::info!(reason = %reason, "stopping crawl pipeline");
        *recorded = Some(reason);
        drop(recorded);
        self.inner.shutdown.trigger();
        true
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn reason(&self) -> Option<StopReason> {
        self.inner.reason.lock().clone()
    }

    pub fn shutdown(&self) -> Shutdown {
        self.inner.shutdown.clone()
    }

    /// Created -> Running. Fails if stop was requested first.
    pub(crate) fn mark_running(&self) -> bool {
        self.inner
            .state
            .compare_exchange(
                PipelineState::Created as u8,
                PipelineState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn mark_stopped(&self) {
        self.inner
            .state
            .store(PipelineState::Stopped as u8, Ordering::Release);
    }
}
