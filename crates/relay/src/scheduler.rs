//! Pass scheduling.
//!
//! Passes come from two places: a timer re-armed after every pass with the
//! poll interval in effect at that moment, and manual triggers from the
//! admin API. Both go through one gate, so at most one pass is running or
//! queued at any time. A trigger that finds the gate taken is refused rather
//! than queued behind the running pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::pipeline::{PassReport, SyncEngine};
use crate::settings::Settings;

/// Answer to a manual trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A pass will start shortly.
    Accepted,
    /// A pass is already running or about to; nothing was queued.
    Busy,
}

/// Snapshot of scheduler activity.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    /// A pass is running or about to start.
    pub running: bool,
    pub passes_completed: u64,
    pub last_finished_at: Option<DateTime<Utc>>,
    pub last_report: Option<PassReport>,
    pub last_error: Option<String>,
    /// Delay before the next timed pass, as armed after the last pass.
    pub next_pass_in_secs: Option<u64>,
}

#[derive(Debug, Default)]
struct Gate(AtomicBool);

impl Gate {
    fn try_acquire(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release(&self) {
        self.0.store(false, Ordering::Release);
    }

    fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Cloneable handle for requesting passes and reading status.
#[derive(Clone)]
pub struct SchedulerHandle {
    gate: Arc<Gate>,
    requests: mpsc::Sender<()>,
    status: watch::Receiver<SchedulerStatus>,
}

impl SchedulerHandle {
    /// Request an immediate pass.
    pub fn trigger(&self) -> TriggerOutcome {
        if !self.gate.try_acquire() {
            return TriggerOutcome::Busy;
        }
        if self.requests.try_send(()).is_err() {
            // Scheduler loop is gone.
            self.gate.release();
            return TriggerOutcome::Busy;
        }
        TriggerOutcome::Accepted
    }

    pub fn is_running(&self) -> bool {
        self.gate.is_held()
    }

    /// Current status.
    pub fn status(&self) -> SchedulerStatus {
        let mut status = self.status.borrow().clone();
        status.running = self.is_running();
        status
    }

    /// Receiver that changes after every completed pass.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.clone()
    }
}

/// Owns the pass loop. Create with [`Scheduler::new`], then [`Scheduler::run`].
pub struct Scheduler {
    engine: Arc<SyncEngine>,
    gate: Arc<Gate>,
    requests: mpsc::Receiver<()>,
    status: watch::Sender<SchedulerStatus>,
}

impl Scheduler {
    #[must_use]
    pub fn new(engine: Arc<SyncEngine>) -> (Self, SchedulerHandle) {
        let gate = Arc::new(Gate::default());
        let (request_tx, request_rx) = mpsc::channel(1);
        let (status_tx, status_rx) = watch::channel(SchedulerStatus::default());

        let scheduler = Self {
            engine,
            gate: gate.clone(),
            requests: request_rx,
            status: status_tx,
        };
        let handle = SchedulerHandle {
            gate,
            requests: request_tx,
            status: status_rx,
        };
        (scheduler, handle)
    }

    /// Run an initial pass, then loop until `shutdown` is cancelled.
    ///
    /// Cancellation is only observed between passes.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!("Scheduler started");

        let mut interval = Settings::default().poll_interval();
        if self.gate.try_acquire() {
            interval = self.pass(interval).await;
        } else {
            // A trigger got in first; it is waiting in the queue.
            interval = self.next_interval(interval).await;
        }

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!("Scheduler stopping");
                    break;
                }
                Some(()) = self.requests.recv() => {
                    tracing::info!("Running triggered pass");
                    interval = self.pass(interval).await;
                }
                () = tokio::time::sleep(interval) => {
                    if self.gate.try_acquire() {
                        interval = self.pass(interval).await;
                    } else {
                        tracing::debug!("Timer fired while a pass is pending, skipping");
                    }
                }
            }
        }
    }

    /// Run one pass with the gate held. Returns the delay before the next
    /// timed pass.
    async fn pass(&self, previous: Duration) -> Duration {
        let result = self.engine.run_pass().await;
        self.gate.release();

        let interval = self.next_interval(previous).await;
        let finished_at = Utc::now();

        self.status.send_modify(|status| {
            status.passes_completed += 1;
            status.last_finished_at = Some(finished_at);
            status.next_pass_in_secs = Some(interval.as_secs());
            match result {
                Ok(report) => {
                    status.last_report = Some(report);
                    status.last_error = None;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Sync pass failed");
                    status.last_error = Some(e.to_string());
                }
            }
        });

        tracing::debug!(next_in_secs = interval.as_secs(), "Timer re-armed");
        interval
    }

    /// Poll interval from the current settings, or `previous` if they
    /// cannot be read.
    async fn next_interval(&self, previous: Duration) -> Duration {
        match self.engine.settings().await {
            Ok(settings) => settings.poll_interval(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read settings, keeping previous interval");
                previous
            }
        }
    }
}
