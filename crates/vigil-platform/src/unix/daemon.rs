//! Double-fork daemonization.
//!
//! Must run while the process is still single-threaded: before the tokio
//! runtime is built.

use std::fs::OpenOptions;
use std::os::fd::IntoRawFd;

use nix::unistd::{ForkResult, fork, setsid};

use crate::fatal::require;

/// Descriptor limit used when `sysconf(_SC_OPEN_MAX)` is indeterminate.
const FALLBACK_OPEN_MAX: libc::c_int = 8192;

/// Detaches from the controlling terminal and session.
///
/// Forks (parent exits 0), starts a new session, forks again so the daemon
/// can never reacquire a terminal, closes every inherited descriptor, and
/// points stdin, stdout, and stderr at `/dev/null`. Any failure is fatal.
pub fn daemonize() {
    fork_and_exit_parent("first fork");
    require(setsid(), "setsid");
    fork_and_exit_parent("second fork");

    close_all_descriptors();
    require(redirect_standard_streams(), "redirecting standard streams");
    tracing::debug!(pid = std::process::id(), "daemonized");
}

fn fork_and_exit_parent(what: &str) {
    // SAFETY: called before any other thread exists, so the child is a
    // faithful copy of a single-threaded process.
    match require(unsafe { fork() }, what) {
        // SAFETY: _exit skips atexit handlers and buffered stdio, which
        // belong to the child now.
        ForkResult::Parent { .. } => unsafe { libc::_exit(0) },
        ForkResult::Child => {}
    }
}

fn open_max() -> libc::c_int {
    // SAFETY: sysconf has no preconditions.
    let max = unsafe { libc::sysconf(libc::_SC_OPEN_MAX) };
    if max <= 0 {
        FALLBACK_OPEN_MAX
    } else {
        libc::c_int::try_from(max).unwrap_or(FALLBACK_OPEN_MAX)
    }
}

fn close_all_descriptors() {
    for fd in 0..open_max() {
        // SAFETY: nothing in this process owns a descriptor yet; closing
        // an unused number just returns EBADF.
        unsafe { libc::close(fd) };
    }
}

fn redirect_standard_streams() -> std::io::Result<()> {
    let null = OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/null")?
        .into_raw_fd();
    for target in 0..=2 {
        if null != target {
            // SAFETY: null is an open descriptor and target is a standard
            // stream number.
            if unsafe { libc::dup2(null, target) } < 0 {
                return Err(std::io::Error::last_os_error());
            }
        }
    }
    if null > 2 {
        // SAFETY: null was obtained from into_raw_fd and is not used again.
        unsafe { libc::close(null) };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_max_is_positive() {
        assert!(open_max() > 2);
    }
}
