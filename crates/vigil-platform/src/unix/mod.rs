//! POSIX service host.

pub mod daemon;
pub mod host;
pub mod init_script;
pub mod syslog;

pub use daemon::daemonize;
pub use host::{PosixHost, StopSignals};
pub use init_script::InitScript;
pub use syslog::Syslog;
