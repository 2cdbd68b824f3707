//! Service status tracking shared by the controller and the control handler.
//!
//! [`ServiceRuntime`] is created when the service entry point begins and
//! shared through an `Arc`. The only mutable state is the status record
//! behind a mutex and the stop event.

use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::SupervisorConfig;

/// Phase reported to the service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServicePhase {
    /// Engine is being launched.
    StartPending,
    /// Engine is running.
    Running,
    /// Shutdown is in progress.
    StopPending,
    /// Terminal phase.
    Stopped,
}

impl ServicePhase {
    /// Returns true for the transitional phases.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::StartPending | Self::StopPending)
    }

    /// Stop requests are accepted in every phase but `StartPending`.
    #[must_use]
    pub const fn accepts_stop(self) -> bool {
        !matches!(self, Self::StartPending)
    }
}

/// A status report as handed to the service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRecord {
    /// Reported phase.
    pub phase: ServicePhase,
    /// 0 for steady phases, an increasing counter for pending ones.
    pub checkpoint: u32,
    /// How long the manager should wait before expecting the next report.
    pub wait_hint: Duration,
    /// Whether stop controls are accepted.
    pub accepts_stop: bool,
    /// Process exit code, only meaningful with `Stopped`.
    pub exit_code: u32,
}

/// Receives status reports.
pub trait StatusReporter: Send + Sync {
    /// Publishes one status record.
    fn report(&self, record: &StatusRecord);
}

/// Reporter that only logs, for hosts without a service manager API.
#[derive(Debug, Clone)]
pub struct TracingReporter {
    service: String,
}

impl TracingReporter {
    /// Creates a reporter tagging records with `service`.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl StatusReporter for TracingReporter {
    fn report(&self, record: &StatusRecord) {
        tracing::info!(
            service = %self.service,
            phase = ?record.phase,
            checkpoint = record.checkpoint,
            "service status"
        );
    }
}

#[derive(Debug, Default)]
struct StatusState {
    phase: Option<ServicePhase>,
    next_checkpoint: u32,
}

/// Process-wide service state: status record plus stop event.
pub struct ServiceRuntime {
    status: Mutex<StatusState>,
    stop: CancellationToken,
    reporter: Box<dyn StatusReporter>,
    stop_hint: Duration,
}

impl ServiceRuntime {
    /// Creates the runtime state; nothing is reported until the first call
    /// to [`ServiceRuntime::report`].
    #[must_use]
    pub fn new(reporter: Box<dyn StatusReporter>) -> Self {
        Self {
            status: Mutex::new(StatusState {
                phase: None,
                next_checkpoint: 1,
            }),
            stop: CancellationToken::new(),
            reporter,
            stop_hint: SupervisorConfig::default().stop_wait_hint(),
        }
    }

    /// Sets the wait hint reported with `StopPending`.
    #[must_use]
    pub fn with_stop_hint(mut self, hint: Duration) -> Self {
        self.stop_hint = hint;
        self
    }

    /// Wait hint reported with `StopPending`.
    #[must_use]
    pub const fn stop_hint(&self) -> Duration {
        self.stop_hint
    }

    /// Reports `phase` with the given wait hint.
    ///
    /// Returns false if the report was dropped: nothing follows `Stopped`,
    /// and once `StopPending` is reported the service cannot go back to
    /// starting or running.
    pub fn report(&self, phase: ServicePhase, wait_hint: Duration) -> bool {
        self.publish(phase, wait_hint, 0)
    }

    /// Reports `Stopped` with an exit code.
    pub fn report_stopped(&self, exit_code: u32) -> bool {
        self.publish(ServicePhase::Stopped, Duration::ZERO, exit_code)
    }

    /// Reports `StopPending` with the stop hint unless it or `Stopped` was
    /// already reported. Check and report happen under one lock.
    pub fn enter_stop_pending(&self) -> bool {
        let mut state = self.status.lock();
        if matches!(
            state.phase,
            Some(ServicePhase::StopPending | ServicePhase::Stopped)
        ) {
            return false;
        }
        self.publish_locked(&mut state, ServicePhase::StopPending, self.stop_hint, 0)
    }

    fn publish(&self, phase: ServicePhase, wait_hint: Duration, exit_code: u32) -> bool {
        let mut state = self.status.lock();
        self.publish_locked(&mut state, phase, wait_hint, exit_code)
    }

    fn publish_locked(
        &self,
        state: &mut StatusState,
        phase: ServicePhase,
        wait_hint: Duration,
        exit_code: u32,
    ) -> bool {
        match (state.phase, phase) {
            (Some(ServicePhase::Stopped), _) => return false,
            (
                Some(ServicePhase::StopPending),
                ServicePhase::StartPending | ServicePhase::Running,
            ) => return false,
            _ => {}
        }

        let checkpoint = if phase.is_pending() {
            let checkpoint = state.next_checkpoint;
            state.next_checkpoint = state.next_checkpoint.saturating_add(1);
            checkpoint
        } else {
            0
        };
        state.phase = Some(phase);

        let record = StatusRecord {
            phase,
            checkpoint,
            wait_hint,
            accepts_stop: phase.accepts_stop(),
            exit_code,
        };
        // Reported under the lock so the manager sees phases in order.
        self.reporter.report(&record);
        true
    }

    /// Control-event entry point: reports `StopPending` and sets the stop
    /// event. Never blocks on the engine.
    pub fn request_stop(&self) {
        self.enter_stop_pending();
        self.stop.cancel();
    }

    /// Resolves once a stop was requested.
    pub async fn stop_requested(&self) {
        self.stop.cancelled().await;
    }

    /// Returns true if a stop was requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Last reported phase.
    #[must_use]
    pub fn phase(&self) -> Option<ServicePhase> {
        self.status.lock().phase
    }
}

impl std::fmt::Debug for ServiceRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRuntime")
            .field("phase", &self.phase())
            .field("stop_requested", &self.is_stop_requested())
            .field("stop_hint", &self.stop_hint)
            .finish_non_exhaustive()
    }
}
