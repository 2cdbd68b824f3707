//! Supervises real `/bin/sh` engines end to end.
#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use vigil::core::{MemoryLog, StatusRecord, StatusReporter};
use vigil::prelude::*;

/// Records each phase along with how many log lines had arrived by then.
struct Recorder {
    log: Arc<MemoryLog>,
    seen: Arc<Mutex<Vec<(ServicePhase, usize)>>>,
}

impl StatusReporter for Recorder {
    fn report(&self, record: &StatusRecord) {
        self.seen
            .lock()
            .unwrap()
            .push((record.phase, self.log.len()));
    }
}

struct Harness {
    log: Arc<MemoryLog>,
    seen: Arc<Mutex<Vec<(ServicePhase, usize)>>>,
    runtime: Arc<ServiceRuntime>,
}

impl Harness {
    fn new() -> Self {
        let log = Arc::new(MemoryLog::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let runtime = Arc::new(ServiceRuntime::new(Box::new(Recorder {
            log: Arc::clone(&log),
            seen: Arc::clone(&seen),
        })));
        Self { log, seen, runtime }
    }

    fn phases(&self) -> Vec<ServicePhase> {
        self.seen.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }

    fn lines_at_stopped(&self) -> usize {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| *p == ServicePhase::Stopped)
            .map(|(_, n)| *n)
            .unwrap()
    }

    async fn wait_for_lines(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.log.len() < n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }
}

fn shell(script: &str) -> EngineCommand {
    EngineCommand::new("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[tokio::test]
async fn test_quit_flushes_final_line_before_stopped() {
    let h = Harness::new();
    let command = shell(
        r#"echo "info: ready" >&2; read cmd; echo "info: shutting down ($cmd)" >&2; exit 0"#,
    );
    let config = SupervisorConfig::new();
    let sink: Arc<dyn SystemLog> = h.log.clone();
    let task = {
        let runtime = Arc::clone(&h.runtime);
        tokio::spawn(async move { supervise(runtime, &command, &config, sink).await })
    };

    h.wait_for_lines(1).await;
    h.runtime.request_stop();
    let outcome = task.await.unwrap();

    assert_eq!(outcome.cause, StopCause::StopRequested);
    assert_eq!(outcome.exit_code(), 0);
    assert!(!outcome.summary.unwrap().forced);

    let entries = h.log.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].text, "info: ready");
    assert_eq!(entries[1].text, "info: shutting down (q)");
    assert!(entries.iter().all(|e| e.severity == Severity::Information));

    assert_eq!(
        h.phases(),
        vec![
            ServicePhase::StartPending,
            ServicePhase::Running,
            ServicePhase::StopPending,
            ServicePhase::Stopped,
        ]
    );
    assert_eq!(h.lines_at_stopped(), 2);
}

#[tokio::test]
async fn test_severities_follow_prefix() {
    let h = Harness::new();
    let command = shell(
        r#"echo "error: disk full" >&2; echo "debug: tick" >&2; echo "weird" >&2; exit 0"#,
    );
    let outcome = supervise(
        Arc::clone(&h.runtime),
        &command,
        &SupervisorConfig::new(),
        h.log.clone(),
    )
    .await;

    assert_eq!(outcome.cause, StopCause::EngineExited);
    let severities: Vec<_> = h.log.entries().iter().map(|e| e.severity).collect();
    assert_eq!(
        severities,
        vec![Severity::Error, Severity::Information, Severity::Warning]
    );
}

#[tokio::test]
async fn test_engine_crash_stops_service() {
    let h = Harness::new();
    let outcome = supervise(
        Arc::clone(&h.runtime),
        &shell("exit 2"),
        &SupervisorConfig::new(),
        h.log.clone(),
    )
    .await;

    assert_eq!(outcome.cause, StopCause::EngineExited);
    assert_eq!(outcome.exit_code(), 2);
    assert!(h.log.is_empty());
    assert_eq!(h.phases().last(), Some(&ServicePhase::Stopped));
}

#[tokio::test]
async fn test_missing_engine_reports_start_failure() {
    let h = Harness::new();
    let command = EngineCommand::new("/nonexistent/pubsubsql", vec![]);
    let outcome = supervise(
        Arc::clone(&h.runtime),
        &command,
        &SupervisorConfig::new(),
        h.log.clone(),
    )
    .await;

    assert_eq!(outcome.cause, StopCause::StartFailed);
    assert_eq!(outcome.exit_code(), 1);
    assert_eq!(
        h.phases(),
        vec![ServicePhase::StartPending, ServicePhase::Stopped]
    );
    let entries = h.log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, Severity::Error);
    assert!(entries[0].text.contains("/nonexistent/pubsubsql"));
}

#[tokio::test]
async fn test_unresponsive_engine_is_killed_within_bound() {
    let h = Harness::new();
    let mut config = SupervisorConfig::new();
    config.stop_timeout = Duration::from_millis(300);
    let command = shell("exec sleep 30");
    let sink: Arc<dyn SystemLog> = h.log.clone();
    let task = {
        let runtime = Arc::clone(&h.runtime);
        tokio::spawn(async move { supervise(runtime, &command, &config, sink).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    let started = std::time::Instant::now();
    h.runtime.request_stop();
    let outcome = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(outcome.cause, StopCause::StopRequested);
    assert!(outcome.summary.unwrap().forced);
    assert_eq!(outcome.exit_code(), 0);
}
