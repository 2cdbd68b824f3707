//! The supervised engine process.
//!
//! A [`ChildProcess`] owns the engine's process handle, the write end of
//! its stdin pipe, and the redirector draining its stderr pipe. Stdout is
//! discarded; the engine writes diagnostics to stderr only.

use std::fmt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::error::{Result, SupervisorError};
use crate::pipe::{Pipe, into_async_reader};
use crate::redirect::{LogRedirector, RedirectStats, RedirectorHandle};
use crate::sink::SystemLog;

/// Line the engine treats as a request to shut down.
pub const QUIT_COMMAND: &str = "q";

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Lifecycle of a [`ChildProcess`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildState {
    /// Not spawned yet, or the spawn failed.
    NotStarted,
    /// Spawned and not yet asked to stop.
    Running,
    /// The quit command was sent.
    StopRequested,
    /// Exited or killed, and reaped.
    Terminated,
}

/// Program and arguments for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    /// Path to the engine binary.
    pub program: PathBuf,
    /// Arguments passed through unchanged.
    pub args: Vec<String>,
}

impl EngineCommand {
    /// Creates a command.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Result of the bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitSummary {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
    /// Whether the process had to be killed.
    pub forced: bool,
    /// What the redirector forwarded before it stopped.
    pub redirect: RedirectStats,
}

/// Operations the controller needs from a supervised process.
#[async_trait]
pub trait Supervised: Send {
    /// Launches the process and starts redirecting its diagnostics.
    fn start(&mut self, command: &EngineCommand, sink: Arc<dyn SystemLog>) -> Result<()>;

    /// Sends the cooperative quit command. Never blocks.
    fn stop(&mut self);

    /// Waits for the process to exit on its own. Cancel safe.
    async fn wait_exit(&mut self) -> Result<Option<i32>>;

    /// Bounded wait, then forced cleanup.
    async fn wait(&mut self, timeout: Duration) -> Result<ExitSummary>;

    /// OS process identifier while running.
    fn id(&self) -> Option<u32>;
}

/// The engine process and its pipes.
#[derive(Debug)]
pub struct ChildProcess {
    state: ChildState,
    child: Option<Child>,
    pid: Option<u32>,
    stdin: Option<Pipe>,
    redirector: Option<RedirectorHandle>,
    grace: Duration,
}

impl ChildProcess {
    /// Creates an unstarted process that waits `grace` before forced cleanup.
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        Self {
            state: ChildState::NotStarted,
            child: None,
            pid: None,
            stdin: None,
            redirector: None,
            grace,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ChildState {
        self.state
    }

    fn spawn(&mut self, command: &EngineCommand, sink: Arc<dyn SystemLog>) -> Result<()> {
        if self.state != ChildState::NotStarted {
            return Err(SupervisorError::state("engine was already started"));
        }

        let mut stdin = Pipe::create()?;
        let mut stderr = Pipe::create()?;
        let (Some(child_stdin), Some(child_stderr), Some(log_end)) =
            (stdin.take_reader(), stderr.take_writer(), stderr.take_reader())
        else {
            return Err(SupervisorError::pipe("pipe end unavailable"));
        };
        let log_reader = into_async_reader(log_end)?;

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::from(child_stdin))
            .stdout(Stdio::null())
            .stderr(Stdio::from(child_stderr))
            .kill_on_drop(true);
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let spawned = cmd.spawn();
        // Release our copies of the child's ends so EOF is observable.
        drop(cmd);
        let child = spawned
            .map_err(|e| SupervisorError::spawn(format!("{}: {e}", command.program.display())))?;

        self.pid = child.id();
        tracing::info!(pid = ?self.pid, command = %command, "engine started");

        self.redirector = Some(LogRedirector::spawn(log_reader, sink));
        self.stdin = Some(stdin);
        self.child = Some(child);
        self.state = ChildState::Running;
        Ok(())
    }

    fn send_quit(&mut self) {
        let Some(stdin) = self.stdin.as_mut() else {
            return;
        };
        if let Err(e) = stdin.write_line(QUIT_COMMAND) {
            tracing::debug!(error = %e, "quit command not delivered");
        }
        if self.state == ChildState::Running {
            self.state = ChildState::StopRequested;
        }
    }

    async fn bounded_wait(&mut self, timeout: Duration) -> Result<ExitSummary> {
        let Some(mut child) = self.child.take() else {
            return Err(SupervisorError::state("engine is not running"));
        };

        let mut status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "waiting for engine failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    timeout = %humantime::format_duration(timeout),
                    "engine did not exit in time"
                );
                None
            }
        };

        tokio::time::sleep(self.grace).await;

        let mut forced = false;
        if status.is_none() {
            status = child.try_wait().ok().flatten();
        }
        if status.is_none() {
            forced = true;
            if let Err(e) = child.start_kill() {
                tracing::warn!(error = %e, "failed to kill engine");
            }
            status = match child.wait().await {
                Ok(status) => Some(status),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to reap engine");
                    None
                }
            };
        }

        let redirect = match self.redirector.take() {
            Some(handle) => {
                if !handle.is_finished() {
                    tracing::debug!("diagnostic pipe still open, cancelling redirector");
                    handle.cancel();
                }
                handle.join().await
            }
            None => RedirectStats::default(),
        };

        if let Some(mut stdin) = self.stdin.take() {
            stdin.close();
        }
        self.state = ChildState::Terminated;

        let code = status.and_then(|s: ExitStatus| s.code());
        tracing::info!(pid = ?self.pid, code = ?code, forced, lines = redirect.lines, "engine terminated");
        self.pid = None;

        Ok(ExitSummary {
            code,
            forced,
            redirect,
        })
    }
}

#[async_trait]
impl Supervised for ChildProcess {
    /// Spawns the engine with stdin and stderr on fresh pipes and starts
    /// the redirector on the stderr read end.
    ///
    /// Must be called from inside a tokio runtime. On failure nothing but
    /// the two pipes was created, and they are closed again.
    fn start(&mut self, command: &EngineCommand, sink: Arc<dyn SystemLog>) -> Result<()> {
        self.spawn(command, sink)
    }

    fn stop(&mut self) {
        self.send_quit();
    }

    async fn wait_exit(&mut self) -> Result<Option<i32>> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| SupervisorError::state("engine is not running"))?;
        let status = child.wait().await?;
        Ok(status.code())
    }

    /// Waits up to `timeout`, sleeps the grace period, kills the engine if
    /// it is still alive, then cancels and joins the redirector.
    async fn wait(&mut self, timeout: Duration) -> Result<ExitSummary> {
        self.bounded_wait(timeout).await
    }

    fn id(&self) -> Option<u32> {
        self.pid
    }
}
