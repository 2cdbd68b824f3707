//! Error types for vigil-core.
//!
//! Every failure of the supervisor is an explicit value; nothing panics.

/// Result type alias for supervisor operations.
pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Error type covering every failure the supervisor can report.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// An OS pipe could not be created or one of its ends is gone.
    #[error("pipe error: {0}")]
    Pipe(String),

    /// The engine process could not be launched.
    #[error("failed to spawn engine: {0}")]
    Spawn(String),

    /// The operation does not apply to the current lifecycle state.
    #[error("invalid state: {0}")]
    State(String),

    /// A service registration already exists.
    #[error("service is already installed ({0})")]
    AlreadyInstalled(String),

    /// No service registration exists.
    #[error("service is not installed ({0})")]
    NotInstalled(String),

    /// Writing or removing the service registration failed.
    #[error("registration failed: {0}")]
    Registration(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Signal or control-event plumbing failed.
    #[error("signal error: {0}")]
    Signal(String),

    /// Platform facility (syslog, event log, SCM) failed.
    #[error("platform error: {0}")]
    Platform(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SupervisorError {
    /// Creates a pipe error.
    #[must_use]
    pub fn pipe(msg: impl Into<String>) -> Self {
        Self::Pipe(msg.into())
    }

    /// Creates a spawn error.
    #[must_use]
    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::Spawn(msg.into())
    }

    /// Creates an invalid-state error.
    #[must_use]
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Creates a registration error.
    #[must_use]
    pub fn registration(msg: impl Into<String>) -> Self {
        Self::Registration(msg.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a signal error.
    #[must_use]
    pub fn signal(msg: impl Into<String>) -> Self {
        Self::Signal(msg.into())
    }

    /// Creates a platform error.
    #[must_use]
    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform(msg.into())
    }

    /// Returns true if the error aborted a start attempt before the engine ran.
    #[must_use]
    pub const fn is_setup_failure(&self) -> bool {
        matches!(self, Self::Pipe(_) | Self::Spawn(_))
    }

    /// Returns true if the error is an install/uninstall conflict.
    #[must_use]
    pub const fn is_install_conflict(&self) -> bool {
        matches!(self, Self::AlreadyInstalled(_) | Self::NotInstalled(_))
    }
}
