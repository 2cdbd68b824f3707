//! Supervisor configuration.
//!
//! Configuration is validated at load time, with defaults matching the
//! stock engine layout.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SupervisorError};

/// Supervisor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Service name registered with the service manager (also the Event Log source).
    pub service_name: String,

    /// Identity attached to every system log entry.
    pub log_identity: String,

    /// File name of the engine binary, looked up next to the supervisor.
    pub engine_name: String,

    /// Location of the generated init script (POSIX).
    pub init_script: PathBuf,

    /// How long the engine gets to exit after the quit command.
    #[serde(with = "humantime_serde")]
    pub stop_timeout: Duration,

    /// Delay before forced cleanup, lets a final log line flush.
    #[serde(with = "humantime_serde")]
    pub flush_grace: Duration,

    /// Wait hint reported while the engine is starting.
    #[serde(with = "humantime_serde")]
    pub start_wait_hint: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            service_name: "pubsubsql".to_string(),
            log_identity: "pubsubsql".to_string(),
            engine_name: "pubsubsql".to_string(),
            init_script: PathBuf::from("/etc/init.d/pubsubsqld"),
            stop_timeout: Duration::from_secs(3),
            flush_grace: Duration::from_millis(100),
            start_wait_hint: Duration::from_secs(3),
        }
    }
}

impl SupervisorConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("service_name", &self.service_name),
            ("log_identity", &self.log_identity),
            ("engine_name", &self.engine_name),
        ] {
            if value.is_empty() {
                return Err(SupervisorError::config(format!("{field} cannot be empty")));
            }
            if !value
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
            {
                return Err(SupervisorError::config(format!(
                    "{field} must contain only alphanumeric characters, dots, hyphens, and underscores"
                )));
            }
        }

        if !self.init_script.is_absolute() {
            return Err(SupervisorError::config("init_script must be an absolute path"));
        }

        if self.stop_timeout.is_zero() {
            return Err(SupervisorError::config("stop_timeout must be positive"));
        }

        if self.flush_grace > self.stop_timeout {
            return Err(SupervisorError::config(format!(
                "flush_grace ({}) cannot exceed stop_timeout ({})",
                humantime::format_duration(self.flush_grace),
                humantime::format_duration(self.stop_timeout)
            )));
        }

        Ok(())
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| SupervisorError::config(format!("failed to read config: {e}")))?;
        Self::parse(&content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    /// Returns an error if the text is not valid configuration.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| SupervisorError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Longest a bounded shutdown can take: the stop timeout plus the grace
    /// period before forced cleanup.
    #[must_use]
    pub fn stop_wait_hint(&self) -> Duration {
        self.stop_timeout.saturating_add(self.flush_grace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = SupervisorConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.stop_timeout, Duration::from_secs(3));
        assert_eq!(config.flush_grace, Duration::from_millis(100));
        assert_eq!(config.stop_wait_hint(), Duration::from_millis(3100));
    }

    #[test]
    fn test_parse_partial_file_keeps_defaults() {
        let config = SupervisorConfig::parse(
            r#"
            service_name = "pubsubsql-test"
            stop_timeout = "5s"
            flush_grace = "250ms"
            "#,
        )
        .unwrap();
        assert_eq!(config.service_name, "pubsubsql-test");
        assert_eq!(config.stop_timeout, Duration::from_secs(5));
        assert_eq!(config.flush_grace, Duration::from_millis(250));
        assert_eq!(config.engine_name, "pubsubsql");
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut config = SupervisorConfig::new();
        config.service_name = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("service_name"));
    }

    #[test]
    fn test_name_with_separator_rejected() {
        let mut config = SupervisorConfig::new();
        config.engine_name = "../pubsubsql".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_grace_longer_than_timeout_rejected() {
        let err = SupervisorConfig::parse("stop_timeout = \"50ms\"\nflush_grace = \"1s\"")
            .unwrap_err();
        assert!(err.to_string().contains("flush_grace"));
    }

    #[test]
    fn test_relative_init_script_rejected() {
        let err = SupervisorConfig::parse("init_script = \"init.d/pubsubsqld\"").unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_identity = \"pubsubsql-qa\"").unwrap();
        let config = SupervisorConfig::load(file.path()).unwrap();
        assert_eq!(config.log_identity, "pubsubsql-qa");
    }

    #[test]
    fn test_load_missing_file() {
        let err = SupervisorConfig::load("/nonexistent/vigil.toml").unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
