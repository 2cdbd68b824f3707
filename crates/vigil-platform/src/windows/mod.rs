//! Windows service host.

pub mod eventlog;
mod handles;
pub mod scm;
pub mod service;

use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;

pub use eventlog::EventLog;
pub use service::ScmHost;

/// Event source used when no service name is known yet.
pub const FALLBACK_SOURCE: &str = "vigil";

/// Encodes `s` as a NUL-terminated UTF-16 buffer.
pub(crate) fn wide(s: impl AsRef<OsStr>) -> Vec<u16> {
    s.as_ref().encode_wide().chain(std::iter::once(0)).collect()
}

/// Quotes one command-line argument the way CommandLineToArgvW splits them.
#[must_use]
pub fn quote_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains([' ', '\t', '"']) {
        return arg.to_string();
    }
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    let mut backslashes = 0;
    for c in arg.chars() {
        if c == '\\' {
            backslashes += 1;
            continue;
        }
        let escapes = if c == '"' { backslashes * 2 + 1 } else { backslashes };
        quoted.extend(std::iter::repeat_n('\\', escapes));
        quoted.push(c);
        backslashes = 0;
    }
    quoted.extend(std::iter::repeat_n('\\', backslashes * 2));
    quoted.push('"');
    quoted
}
