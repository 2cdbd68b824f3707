//! syslog(3) sink.

use std::ffi::CString;

use vigil_core::{Result, Severity, SupervisorError, SystemLog};

/// Writes engine output to syslog under the `LOG_USER` facility.
///
/// openlog(3) keeps a pointer to the identity string, so the string lives
/// as long as this value. Only one instance should exist per process.
#[derive(Debug)]
pub struct Syslog {
    ident: CString,
}

impl Syslog {
    /// Opens the system log with `identity` as the tag.
    ///
    /// # Errors
    /// Fails if `identity` contains a NUL byte.
    pub fn open(identity: &str) -> Result<Self> {
        let ident = CString::new(identity)
            .map_err(|_| SupervisorError::config("log identity contains a NUL byte"))?;
        // SAFETY: ident is NUL-terminated and is kept alive in the returned
        // value until closelog runs in Drop.
        unsafe { libc::openlog(ident.as_ptr(), libc::LOG_PID, libc::LOG_USER) };
        tracing::debug!(identity, "syslog opened");
        Ok(Self { ident })
    }

    /// Identity passed to openlog.
    #[must_use]
    pub fn identity(&self) -> &str {
        self.ident.to_str().unwrap_or_default()
    }
}

/// Maps a severity to a syslog priority.
#[must_use]
pub const fn priority(severity: Severity) -> libc::c_int {
    match severity {
        Severity::Information => libc::LOG_INFO,
        Severity::Warning => libc::LOG_WARNING,
        Severity::Error => libc::LOG_ERR,
    }
}

impl SystemLog for Syslog {
    fn write(&self, severity: Severity, message: &str) {
        let Ok(message) = CString::new(message.replace('\0', "")) else {
            return;
        };
        // SAFETY: the format string takes exactly one C string argument and
        // message is NUL-terminated.
        unsafe {
            libc::syslog(
                libc::LOG_USER | priority(severity),
                c"%s".as_ptr(),
                message.as_ptr(),
            );
        }
    }
}

impl Drop for Syslog {
    fn drop(&mut self) {
        // SAFETY: closelog has no preconditions.
        unsafe { libc::closelog() };
    }
}
