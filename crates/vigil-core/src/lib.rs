// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # vigil-core
//!
//! Process lifecycle and log redirection core of the Vigil service
//! supervisor. Platform hosts (POSIX daemon, Windows SCM) live in
//! `vigil-platform` and drive the types here:
//!
//! - [`Pipe`] for the engine's stdin and stderr channels
//! - [`ChildProcess`] to spawn, stop, and reap the engine
//! - [`LogRedirector`] to classify stderr lines and forward them to a [`SystemLog`]
//! - [`ServiceController`] for the StartPending → Running → StopPending → Stopped sequence
//! - [`ServiceRuntime`] for the status record and stop event shared with control handlers
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vigil_core::{
//!     EngineCommand, MemoryLog, ServiceRuntime, SupervisorConfig, TracingReporter, supervise,
//! };
//!
//! # async fn demo() {
//! let config = SupervisorConfig::new();
//! let runtime = Arc::new(ServiceRuntime::new(Box::new(TracingReporter::new("pubsubsql"))));
//! let command = EngineCommand::new("/opt/pubsubsql/pubsubsql", vec![]);
//! let outcome = supervise(runtime, &command, &config, Arc::new(MemoryLog::new())).await;
//! println!("exit code {}", outcome.exit_code());
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Status reports are published while the lock is held on purpose
#![allow(clippy::significant_drop_tightening)]

pub mod child;
pub mod config;
pub mod controller;
pub mod error;
pub mod host;
pub mod pipe;
pub mod redirect;
pub mod severity;
pub mod sink;
pub mod status;
#[cfg(test)]
pub mod tests;

pub use child::{ChildProcess, ChildState, EngineCommand, ExitSummary, QUIT_COMMAND, Supervised};
pub use config::SupervisorConfig;
pub use controller::{ControllerSettings, Outcome, ServiceController, StopCause, supervise};
pub use error::{Result, SupervisorError};
pub use host::{InstallRequest, Launch, ServiceHost};
pub use pipe::{AsyncPipeReader, Pipe, into_async_reader};
pub use redirect::{LogRedirector, MAX_LINE, RedirectStats, RedirectorHandle, StreamEnd};
pub use severity::{LogLine, Severity, classify};
pub use sink::{MemoryLog, SystemLog};
pub use status::{ServicePhase, ServiceRuntime, StatusRecord, StatusReporter, TracingReporter};
