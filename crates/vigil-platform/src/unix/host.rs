//! POSIX host: init script registration and daemon entry point.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{Signal, SignalKind, signal};
use vigil_core::{
    InstallRequest, Launch, Result, ServiceHost, ServiceRuntime, SupervisorConfig,
    SupervisorError, SystemLog, TracingReporter, supervise,
};

use super::daemon::daemonize;
use super::init_script::InitScript;
use super::syslog::Syslog;

/// Upper bound on waiting for blocking tasks once the engine is gone.
const RUNTIME_SHUTDOWN: Duration = Duration::from_secs(1);

/// Service host for Linux and other POSIX systems.
#[derive(Debug, Clone)]
pub struct PosixHost {
    config: SupervisorConfig,
    script: InitScript,
}

impl PosixHost {
    /// Creates a host using the init script path from `config`.
    #[must_use]
    pub fn new(config: SupervisorConfig) -> Self {
        let script = InitScript::new(config.init_script.clone());
        Self { config, script }
    }

    /// The init script this host manages.
    #[must_use]
    pub const fn script(&self) -> &InitScript {
        &self.script
    }
}

impl ServiceHost for PosixHost {
    fn install(&self, request: &InstallRequest) -> Result<()> {
        self.script.install(request)
    }

    fn uninstall(&self) -> Result<()> {
        self.script.uninstall()
    }

    /// Daemonizes unless `launch.foreground` is set, then supervises the
    /// engine until it exits or SIGTERM/SIGINT arrives.
    fn run(&self, launch: Launch) -> Result<i32> {
        if !launch.foreground {
            daemonize();
        }

        let sink: Arc<dyn SystemLog> = Arc::new(Syslog::open(&launch.config.log_identity)?);
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| SupervisorError::platform(format!("failed to build runtime: {e}")))?;

        let service_name = self.config.service_name.clone();
        let result: Result<i32> = rt.block_on(async move {
            // Registered before the engine starts.
            let signals = StopSignals::install()?;
            let runtime = Arc::new(
                ServiceRuntime::new(Box::new(TracingReporter::new(service_name)))
                    .with_stop_hint(launch.config.stop_wait_hint()),
            );
            tokio::spawn(signals.forward(Arc::clone(&runtime)));

            let command = launch.command();
            Ok(supervise(runtime, &command, &launch.config, sink)
                .await
                .exit_code())
        });
        rt.shutdown_timeout(RUNTIME_SHUTDOWN);
        result
    }
}

/// SIGTERM and SIGINT listeners.
#[derive(Debug)]
pub struct StopSignals {
    term: Signal,
    int: Signal,
}

impl StopSignals {
    /// Registers SIGTERM and SIGINT. Must be called inside a tokio runtime.
    ///
    /// # Errors
    /// `Signal` if either handler cannot be registered.
    pub fn install() -> Result<Self> {
        Self::for_kinds(SignalKind::terminate(), SignalKind::interrupt())
    }

    fn for_kinds(term: SignalKind, int: SignalKind) -> Result<Self> {
        let term = signal(term)
            .map_err(|e| SupervisorError::signal(format!("cannot listen for SIGTERM: {e}")))?;
        let int = signal(int)
            .map_err(|e| SupervisorError::signal(format!("cannot listen for SIGINT: {e}")))?;
        Ok(Self { term, int })
    }

    /// Turns the first signal received into a stop request.
    pub async fn forward(mut self, runtime: Arc<ServiceRuntime>) {
        tokio::select! {
            _ = self.term.recv() => tracing::info!(signal = "SIGTERM", "stop signal received"),
            _ = self.int.recv() => tracing::info!(signal = "SIGINT", "stop signal received"),
        }
        runtime.request_stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn host_in(dir: &TempDir) -> PosixHost {
        let mut config = SupervisorConfig::new();
        config.init_script = dir.path().join("pubsubsqld");
        PosixHost::new(config)
    }

    fn request() -> InstallRequest {
        InstallRequest {
            supervisor: PathBuf::from("/opt/pubsubsql/vigil"),
            engine: PathBuf::from("/opt/pubsubsql/pubsubsql"),
            options: vec![],
            config: None,
        }
    }

    #[test]
    fn test_install_uninstall_cycle() {
        let dir = TempDir::new().unwrap();
        let host = host_in(&dir);
        host.install(&request()).unwrap();
        assert!(host.script().is_installed());
        assert!(host.install(&request()).unwrap_err().is_install_conflict());
        host.uninstall().unwrap();
        assert!(host.uninstall().unwrap_err().is_install_conflict());
    }

    #[tokio::test]
    async fn test_signal_triggers_stop_request() {
        let runtime = Arc::new(ServiceRuntime::new(Box::new(TracingReporter::new("test"))));
        let signals = StopSignals::install().unwrap();
        let listener = tokio::spawn(signals.forward(Arc::clone(&runtime)));
        nix::sys::signal::raise(nix::sys::signal::Signal::SIGTERM).unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(2), runtime.stop_requested())
            .await
            .unwrap();
        listener.await.unwrap();
    }

    #[tokio::test]
    async fn test_unregistrable_signal_is_an_error() {
        let sigkill = SignalKind::from_raw(libc::SIGKILL);
        let err = StopSignals::for_kinds(sigkill, SignalKind::interrupt()).unwrap_err();
        assert!(matches!(err, SupervisorError::Signal(_)));
        assert!(err.to_string().contains("SIGTERM"));
    }
}
