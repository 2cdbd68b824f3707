//! System log sinks.
//!
//! The platform crate provides the syslog and Event Log sinks; the
//! in-memory sink here captures entries for inspection.

use parking_lot::Mutex;

use crate::severity::{LogLine, Severity};

/// Destination for classified engine output.
pub trait SystemLog: Send + Sync {
    /// Writes one entry at the given severity.
    fn write(&self, severity: Severity, message: &str);
}

/// Sink that keeps every entry in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<LogLine>>,
}

impl MemoryLog {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the entries written so far.
    #[must_use]
    pub fn entries(&self) -> Vec<LogLine> {
        self.entries.lock().clone()
    }

    /// Number of entries written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl SystemLog for MemoryLog {
    fn write(&self, severity: Severity, message: &str) {
        self.entries.lock().push(LogLine {
            text: message.to_string(),
            severity,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_keeps_order() {
        let log = MemoryLog::new();
        assert!(log.is_empty());
        log.write(Severity::Information, "first");
        log.write(Severity::Error, "second");
        let entries = log.entries();
        assert_eq!(log.len(), 2);
        assert_eq!(entries[0].text, "first");
        assert_eq!(entries[1].severity, Severity::Error);
    }

    #[test]
    fn test_memory_log_keeps_given_severity() {
        // The caller's severity wins over the text
        let log = MemoryLog::new();
        log.write(Severity::Error, "info: looks harmless");
        assert_eq!(log.entries()[0].severity, Severity::Error);
    }
}
