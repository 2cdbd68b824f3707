//! The per-platform service host abstraction.

use std::path::PathBuf;

use crate::child::EngineCommand;
use crate::config::SupervisorConfig;
use crate::error::Result;

/// Everything needed to register the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// Absolute path of the supervisor binary.
    pub supervisor: PathBuf,
    /// Absolute path of the engine binary.
    pub engine: PathBuf,
    /// Engine options recorded verbatim and passed on every start.
    pub options: Vec<String>,
    /// Configuration file to pass back to the supervisor, if any.
    pub config: Option<PathBuf>,
}

impl InstallRequest {
    /// Supervisor arguments for running as the service:
    /// `[--config <file>] svc <engine> <options...>`.
    #[must_use]
    pub fn service_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.options.len() + 4);
        if let Some(config) = &self.config {
            args.push("--config".to_string());
            args.push(config.display().to_string());
        }
        args.push("svc".to_string());
        args.push(self.engine.display().to_string());
        args.extend(self.options.iter().cloned());
        args
    }
}

/// Parameters for running as the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    /// Engine binary.
    pub engine: PathBuf,
    /// Engine options.
    pub options: Vec<String>,
    /// Skip daemonization (POSIX only).
    pub foreground: bool,
    /// Supervisor configuration.
    pub config: SupervisorConfig,
}

impl Launch {
    /// Command line used to start the engine.
    #[must_use]
    pub fn command(&self) -> EngineCommand {
        EngineCommand::new(self.engine.clone(), self.options.clone())
    }
}

/// Registers, unregisters, and runs the service on one platform.
pub trait ServiceHost {
    /// Writes the OS service registration. Fails if it already exists,
    /// leaving the existing registration untouched.
    fn install(&self, request: &InstallRequest) -> Result<()>;

    /// Removes the OS service registration. Fails if there is none.
    fn uninstall(&self) -> Result<()>;

    /// Runs the service until it stops and returns the process exit code.
    fn run(&self, launch: Launch) -> Result<i32>;
}
