//! Shutdown tests: the quit command precedes the bounded wait, forced
//! kills are reported, and final log lines arrive before Stopped.

use std::sync::Arc;
use std::time::Duration;

use crate::child::EngineCommand;
use crate::controller::{ControllerSettings, ServiceController, StopCause};
use crate::severity::Severity;
use crate::sink::MemoryLog;
use crate::status::{ServicePhase, ServiceRuntime};
use crate::tests::mocks::{EngineCall, MockEngine, RecordingReporter};

const STOP_TIMEOUT: Duration = Duration::from_millis(250);

fn settings() -> ControllerSettings {
    ControllerSettings {
        start_wait_hint: Duration::from_secs(3),
        stop_timeout: STOP_TIMEOUT,
    }
}

fn command() -> EngineCommand {
    EngineCommand::new("/opt/pubsubsql/pubsubsql", vec![])
}

fn stopped_runtime() -> (Arc<ServiceRuntime>, RecordingReporter) {
    let reporter = RecordingReporter::new();
    let runtime = Arc::new(ServiceRuntime::new(Box::new(reporter.clone())));
    runtime.request_stop();
    (runtime, reporter)
}

/// Stop is sent before the bounded wait, and the wait uses the configured timeout.
#[tokio::test]
async fn quit_precedes_bounded_wait() {
    let (runtime, _reporter) = stopped_runtime();
    let engine = MockEngine::new();
    let calls = engine.calls();

    ServiceController::new(runtime, engine, Arc::new(MemoryLog::new()), settings())
        .run(&command())
        .await;

    assert_eq!(
        *calls.lock(),
        vec![
            EngineCall::Start("/opt/pubsubsql/pubsubsql".to_string()),
            EngineCall::Stop,
            EngineCall::Wait(STOP_TIMEOUT),
        ]
    );
}

/// Stop is sent even when the engine already exited.
#[tokio::test]
async fn quit_sent_after_engine_exit() {
    let reporter = RecordingReporter::new();
    let runtime = Arc::new(ServiceRuntime::new(Box::new(reporter)));
    let engine = MockEngine::new().exit_after(Duration::from_millis(1), 0);
    let calls = engine.calls();

    ServiceController::new(runtime, engine, Arc::new(MemoryLog::new()), settings())
        .run(&command())
        .await;

    assert!(calls.lock().contains(&EngineCall::Stop));
}

/// An engine that ignores quit is killed; a requested stop still exits 0.
#[tokio::test]
async fn forced_kill_after_requested_stop_exits_zero() {
    let (runtime, reporter) = stopped_runtime();
    let engine = MockEngine::new().ignore_quit();

    let outcome = ServiceController::new(runtime, engine, Arc::new(MemoryLog::new()), settings())
        .run(&command())
        .await;

    let summary = outcome.summary.unwrap();
    assert!(summary.forced);
    assert_eq!(outcome.cause, StopCause::StopRequested);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(reporter.records().last().unwrap().exit_code, 0);
}

/// Lines emitted during shutdown reach the log before Stopped is reported.
#[tokio::test]
async fn final_lines_logged_before_stopped() {
    let (runtime, reporter) = stopped_runtime();
    let log = Arc::new(MemoryLog::new());
    let engine = MockEngine::new().emit_on_quit(&["info: shutting down"]);

    let outcome = ServiceController::new(runtime, engine, log.clone(), settings())
        .run(&command())
        .await;

    assert_eq!(outcome.summary.unwrap().redirect.lines, 1);
    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].text, "info: shutting down");
    assert_eq!(entries[0].severity, Severity::Information);
    assert_eq!(reporter.phases().last(), Some(&ServicePhase::Stopped));
}

/// The control handler's StopPending is not repeated by the controller.
#[tokio::test]
async fn stop_pending_reported_once() {
    let (runtime, reporter) = stopped_runtime();

    ServiceController::new(
        runtime,
        MockEngine::new(),
        Arc::new(MemoryLog::new()),
        settings(),
    )
    .run(&command())
    .await;

    let stop_pending = reporter
        .phases()
        .into_iter()
        .filter(|p| *p == ServicePhase::StopPending)
        .count();
    assert_eq!(stop_pending, 1);
}
