//! Severity classification for engine diagnostic lines.

use std::fmt;

/// Severity of a forwarded line, in system-log terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Informational message.
    Information,
    /// Warning; also the fallback for unrecognized lines.
    Warning,
    /// Error message.
    Error,
}

impl Severity {
    /// Upper-case label used in log output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Information => "INFORMATION",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a line by its leading token.
///
/// Matching is case-sensitive and applied in order: `info`, `error`,
/// `debug`. Everything else, the empty line included, is a warning so
/// that unexpected output is never silently downgraded.
#[must_use]
pub fn classify(line: &str) -> Severity {
    if line.starts_with("info") {
        Severity::Information
    } else if line.starts_with("error") {
        Severity::Error
    } else if line.starts_with("debug") {
        Severity::Information
    } else {
        Severity::Warning
    }
}

/// One line read from the engine's diagnostic stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Line text without its terminator.
    pub text: String,
    /// Severity inferred from the text.
    pub severity: Severity,
}

impl LogLine {
    /// Builds a line from decoded text, classifying it.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let severity = classify(&text);
        Self { text, severity }
    }

    /// Decodes raw bytes read up to (and including) a newline.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    #[must_use]
    pub fn from_bytes(raw: &[u8]) -> Self {
        Self::new(strip_terminator(&String::from_utf8_lossy(raw)))
    }
}

/// Strips one trailing `\n` or `\r\n`.
#[must_use]
pub fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_classify_known_prefixes() {
        assert_eq!(classify("info: listening"), Severity::Information);
        assert_eq!(classify("error: bind failed"), Severity::Error);
        assert_eq!(classify("debug: tick"), Severity::Information);
    }

    #[test]
    fn test_classify_fallback_is_warning() {
        assert_eq!(classify("listening on 7777"), Severity::Warning);
        assert_eq!(classify(""), Severity::Warning);
    }

    #[test]
    fn test_classify_is_case_sensitive() {
        assert_eq!(classify("INFO: listening"), Severity::Warning);
        assert_eq!(classify("Error: bind failed"), Severity::Warning);
    }

    #[test]
    fn test_classify_matches_prefix_not_word() {
        // "information" still starts with "info"
        assert_eq!(classify("information"), Severity::Information);
        assert_eq!(classify(" info: indented"), Severity::Warning);
    }

    #[test]
    fn test_from_bytes_strips_terminators() {
        assert_eq!(LogLine::from_bytes(b"info: up\n").text, "info: up");
        assert_eq!(LogLine::from_bytes(b"error: down\r\n").text, "error: down");
        assert_eq!(LogLine::from_bytes(b"no newline").text, "no newline");
    }

    #[test]
    fn test_from_bytes_replaces_invalid_utf8() {
        let line = LogLine::from_bytes(b"error: \xff\xfe bad bytes\n");
        assert_eq!(line.severity, Severity::Error);
        assert!(line.text.contains('\u{fffd}'));
    }

    #[test]
    fn test_display() {
        assert_eq!(Severity::Information.to_string(), "INFORMATION");
        assert_eq!(Severity::Warning.to_string(), "WARNING");
        assert_eq!(Severity::Error.to_string(), "ERROR");
    }

    proptest! {
        #[test]
        fn prop_info_prefix_is_information(suffix in ".*") {
            prop_assert_eq!(classify(&format!("info{suffix}")), Severity::Information);
        }

        #[test]
        fn prop_error_prefix_is_error(suffix in ".*") {
            prop_assert_eq!(classify(&format!("error{suffix}")), Severity::Error);
        }

        #[test]
        fn prop_unknown_prefix_is_warning(line in "[A-Z0-9 :]*") {
            prop_assert_eq!(classify(&line), Severity::Warning);
        }
    }
}
