//! Vigil: service supervisor for the pubsubsql database engine.
//!
//! Runs the engine as a POSIX daemon or a Windows service, forwards its
//! stderr to syslog or the Event Log, and stops it within a bounded time.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use vigil::prelude::*;
//!
//! let config = SupervisorConfig::new();
//! let host = native_host(&config);
//! host.uninstall()?;
//! # Ok::<(), SupervisorError>(())
//! ```

pub mod cli;

pub use vigil_core as core;
pub use vigil_platform as platform;

/// Prelude module for common imports.
pub mod prelude {
    pub use vigil_core::{
        EngineCommand, InstallRequest, Launch, Outcome, ServiceHost, ServicePhase,
        ServiceRuntime, Severity, StopCause, SupervisorConfig, SupervisorError, SystemLog,
        supervise,
    };
    pub use vigil_platform::{NativeHost, PRIVILEGE_HINT, native_host};
}
