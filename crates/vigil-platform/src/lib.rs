// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # vigil-platform
//!
//! Service hosts for the Vigil supervisor:
//!
//! - **POSIX**: init script registration, double-fork daemonization, syslog
//! - **Windows**: SCM registration with an Event Log source, service
//!   dispatcher, control handler
//!
//! Both implement [`vigil_core::ServiceHost`]; [`NativeHost`] names the one
//! for the build target.
//!
//! ## Example
//!
//! ```rust,ignore
//! use vigil_core::{ServiceHost, SupervisorConfig};
//! use vigil_platform::native_host;
//!
//! let host = native_host(&SupervisorConfig::new());
//! host.uninstall()?;
//! ```

#![warn(missing_docs)]

pub mod fatal;

#[cfg(unix)]
pub mod unix;

#[cfg(windows)]
pub mod windows;

use vigil_core::SupervisorConfig;

/// Service host for the build target.
#[cfg(unix)]
pub type NativeHost = unix::PosixHost;

/// Service host for the build target.
#[cfg(windows)]
pub type NativeHost = windows::ScmHost;

/// Creates the service host for the build target.
#[must_use]
pub fn native_host(config: &SupervisorConfig) -> NativeHost {
    NativeHost::new(config.clone())
}

/// Hint printed when registration fails for lack of privileges.
#[cfg(unix)]
pub const PRIVILEGE_HINT: &str = "make sure you have root privileges";

/// Hint printed when registration fails for lack of privileges.
#[cfg(windows)]
pub const PRIVILEGE_HINT: &str = "make sure you run as Administrator";
