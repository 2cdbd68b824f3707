//! Service lifecycle state machine shared by every host.
//!
//! ```text
//! StartPending ──start ok──▶ Running ──stop event | engine exit──▶ StopPending ──▶ Stopped
//!      │                                                                              ▲
//!      └──────────────────────────────start failed────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::child::{ChildProcess, EngineCommand, ExitSummary, Supervised};
use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use crate::severity::Severity;
use crate::sink::SystemLog;
use crate::status::{ServicePhase, ServiceRuntime};

/// What ended the running phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// The engine could not be started.
    StartFailed,
    /// The service manager (or a signal) asked to stop.
    StopRequested,
    /// The engine exited on its own.
    EngineExited,
}

/// Final result of a controller run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// What ended the run.
    pub cause: StopCause,
    /// Shutdown summary, absent when the engine never started.
    pub summary: Option<ExitSummary>,
}

impl Outcome {
    /// Process exit code for the supervisor.
    ///
    /// A requested stop exits 0 even when the engine had to be killed; an
    /// engine that exited on its own passes its code through.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        let code = self.summary.and_then(|s| s.code);
        match self.cause {
            StopCause::StartFailed => 1,
            StopCause::StopRequested => code.unwrap_or(0),
            StopCause::EngineExited => code.unwrap_or(1),
        }
    }
}

/// Timing used by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Wait hint reported with `StartPending`.
    pub start_wait_hint: Duration,
    /// Bounded wait after the quit command.
    pub stop_timeout: Duration,
}

impl From<&SupervisorConfig> for ControllerSettings {
    fn from(config: &SupervisorConfig) -> Self {
        Self {
            start_wait_hint: config.start_wait_hint,
            stop_timeout: config.stop_timeout,
        }
    }
}

/// Drives one engine through start, composite wait, and bounded shutdown.
pub struct ServiceController<C: Supervised> {
    runtime: Arc<ServiceRuntime>,
    child: C,
    sink: Arc<dyn SystemLog>,
    settings: ControllerSettings,
}

impl<C: Supervised> ServiceController<C> {
    /// Creates a controller for `child`.
    pub fn new(
        runtime: Arc<ServiceRuntime>,
        child: C,
        sink: Arc<dyn SystemLog>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            runtime,
            child,
            sink,
            settings,
        }
    }

    /// Runs the full lifecycle and reports `Stopped` before returning.
    pub async fn run(mut self, command: &EngineCommand) -> Outcome {
        let runtime = Arc::clone(&self.runtime);
        runtime.report(ServicePhase::StartPending, self.settings.start_wait_hint);

        if let Err(e) = self.child.start(command, Arc::clone(&self.sink)) {
            self.report_start_failure(command, &e);
            runtime.report_stopped(1);
            return Outcome {
                cause: StopCause::StartFailed,
                summary: None,
            };
        }

        runtime.report(ServicePhase::Running, Duration::ZERO);

        let cause = tokio::select! {
            () = runtime.stop_requested() => {
                tracing::info!(pid = ?self.child.id(), "stop requested");
                StopCause::StopRequested
            }
            exit = self.child.wait_exit() => {
                match exit {
                    Ok(code) => tracing::warn!(code = ?code, "engine exited on its own"),
                    Err(e) => tracing::warn!(error = %e, "lost track of engine"),
                }
                StopCause::EngineExited
            }
        };

        runtime.enter_stop_pending();

        self.child.stop();
        let summary = match self.child.wait(self.settings.stop_timeout).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::error!(error = %e, "engine shutdown failed");
                None
            }
        };

        let outcome = Outcome { cause, summary };
        let code = outcome.exit_code();
        runtime.report_stopped(u32::try_from(code).unwrap_or(1));
        tracing::info!(cause = ?cause, code, "service stopped");
        outcome
    }

    fn report_start_failure(&self, command: &EngineCommand, error: &SupervisorError) {
        tracing::error!(command = %command, error = %error, "engine failed to start");
        self.sink
            .write(Severity::Error, &format!("failed to start {command}: {error}"));
    }
}

/// Runs `command` under a fresh [`ChildProcess`] with timings from `config`.
pub async fn supervise(
    runtime: Arc<ServiceRuntime>,
    command: &EngineCommand,
    config: &SupervisorConfig,
    sink: Arc<dyn SystemLog>,
) -> Outcome {
    let child = ChildProcess::new(config.flush_grace);
    ServiceController::new(runtime, child, sink, ControllerSettings::from(config))
        .run(command)
        .await
}
