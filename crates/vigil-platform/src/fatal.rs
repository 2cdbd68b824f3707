//! Must-succeed operations.
//!
//! Some bootstrap steps have no recovery: if the process cannot fork or
//! detach, there is no service to report failure to. [`require`] logs the
//! failure at emergency severity and ends the process.

use std::fmt::Display;

/// Exit status used for fatal bootstrap failures.
pub const FATAL_EXIT: i32 = 1;

/// Unwraps `result` or terminates the process.
///
/// On error the message is written to the system log at emergency severity
/// and to tracing, then the process exits with [`FATAL_EXIT`] without
/// running destructors or atexit handlers.
pub fn require<T, E: Display>(result: Result<T, E>, what: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => die(&format!("{what} failed: {e}")),
    }
}

#[cfg(unix)]
fn die(message: &str) -> ! {
    tracing::error!(reason = %message, "fatal bootstrap failure");
    if let Ok(message) = std::ffi::CString::new(message.replace('\0', "")) {
        // SAFETY: both arguments are NUL-terminated and the format string
        // consumes exactly one string argument.
        unsafe { libc::syslog(libc::LOG_USER | libc::LOG_EMERG, c"%s".as_ptr(), message.as_ptr()) };
    }
    // SAFETY: _exit only terminates the process; after fork it is the
    // only safe way to leave without running the parent's atexit handlers.
    unsafe { libc::_exit(FATAL_EXIT) }
}

#[cfg(windows)]
fn die(message: &str) -> ! {
    tracing::error!(reason = %message, "fatal bootstrap failure");
    crate::windows::eventlog::report_once(
        crate::windows::FALLBACK_SOURCE,
        vigil_core::Severity::Error,
        message,
    );
    std::process::exit(FATAL_EXIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_passes_value_through() {
        let value: Result<u32, std::io::Error> = Ok(7);
        assert_eq!(require(value, "fork"), 7);
    }
}
