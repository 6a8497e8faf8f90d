//! Server lifecycle: health state and in-flight pipeline tracking.
//!
//! Health lives in an `ArcSwap` so probes read it without locking. The number
//! of running pipelines is published on a `watch` channel; each pipeline holds
//! a [`PipelineGuard`] and draining waits for the count to reach zero, so no
//! workspace or child process is abandoned mid-run.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;

/// Server health state.
///
/// Starting -> Ready -> Draining -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Starting,
    Ready,
    /// No longer accepting work; waiting on in-flight pipelines.
    Draining,
    Stopped,
}

impl HealthState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

/// Tracks health and running pipelines across the server.
#[derive(Debug)]
pub struct ShutdownController {
    health: ArcSwap<HealthState>,
    running: Arc<watch::Sender<usize>>,
}

impl ShutdownController {
    #[must_use]
    pub fn new() -> Self {
        Self {
            health: ArcSwap::from_pointee(HealthState::Starting),
            running: Arc::new(watch::Sender::new(0)),
        }
    }

    pub fn set_ready(&self) {
        self.health.store(Arc::new(HealthState::Ready));
    }

    /// Moves to `Draining`. Readiness probes start failing from here on.
    pub fn trigger_shutdown(&self) {
        self.health.store(Arc::new(HealthState::Draining));
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        **self.health.load()
    }

    /// Counts one pipeline as running until the guard is dropped.
    #[must_use]
    pub fn in_flight_guard(&self) -> PipelineGuard {
        self.running.send_modify(|n| *n += 1);
        PipelineGuard {
            running: Arc::clone(&self.running),
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        *self.running.borrow()
    }

    /// Waits up to `timeout` for running pipelines to finish.
    ///
    /// Returns `true` and moves to `Stopped` once none remain. Returns `false`,
    /// leaving the state at `Draining`, if the deadline passes first.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let mut rx = self.running.subscribe();
        let drained = tokio::time::timeout(timeout, rx.wait_for(|n| *n == 0))
            .await
            .is_ok_and(|changed| changed.is_ok());

        if drained {
            self.health.store(Arc::new(HealthState::Stopped));
        }
        drained
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks one pipeline as running; the count drops with the guard, unwinding included.
#[derive(Debug)]
pub struct PipelineGuard {
    running: Arc<watch::Sender<usize>>,
}

impl Drop for PipelineGuard {
    fn drop(&mut self) {
        self.running.send_modify(|n| *n = n.saturating_sub(1));
    }
}
