//! SysV-style init script registration.

use std::fs::{self, OpenOptions, Permissions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use vigil_core::{InstallRequest, Result, SupervisorError};

const SCRIPT_MODE: u32 = 0o755;

/// An init script at a fixed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitScript {
    path: PathBuf,
}

impl InitScript {
    /// Creates a handle for the script at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Script location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the script exists.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.path.exists()
    }

    /// Renders the script text for `request`.
    #[must_use]
    pub fn render(&self, request: &InstallRequest) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "service".to_string());
        let options = quote_all(&request.options);
        let config = request
            .config
            .as_ref()
            .map(|c| format!("--config {} ", shell_quote(&c.display().to_string())))
            .unwrap_or_default();

        let mut script = String::new();
        script.push_str("#!/bin/sh\n");
        script.push_str("#\n");
        script.push_str(&format!("# {name}: database engine supervised by vigil\n"));
        script.push_str("#\n");
        script.push_str("# supervisor path\n");
        script.push_str(&format!(
            "SERVICE_PATH={}\n",
            shell_quote(&request.supervisor.display().to_string())
        ));
        script.push_str("# engine path\n");
        script.push_str(&format!(
            "ENGINE_PATH={}\n",
            shell_quote(&request.engine.display().to_string())
        ));
        script.push('\n');
        script.push_str("start() {\n");
        script.push_str(&format!(
            "    \"$SERVICE_PATH\" {config}svc \"$ENGINE_PATH\" {options}\n"
        ));
        script.push_str("}\n\n");
        script.push_str("stop() {\n");
        script.push_str(&format!("    \"$ENGINE_PATH\" stop {options}\n"));
        script.push_str("}\n\n");
        script.push_str("case \"$1\" in\n");
        script.push_str("    start)\n        start\n        ;;\n");
        script.push_str("    stop)\n        stop\n        ;;\n");
        script.push_str(&format!(
            "    *)\n        echo \"Usage: {name} {{start|stop}}\"\n        exit 1\n        ;;\n"
        ));
        script.push_str("esac\n\n");
        script.push_str("exit $?\n");
        script
    }

    /// Writes the script. An existing script is never overwritten.
    ///
    /// # Errors
    /// `AlreadyInstalled` if the script exists, `Registration` if it cannot
    /// be written.
    pub fn install(&self, request: &InstallRequest) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => {
                    SupervisorError::AlreadyInstalled(self.path.display().to_string())
                }
                _ => SupervisorError::registration(format!(
                    "cannot create {}: {e}",
                    self.path.display()
                )),
            })?;

        let written = file
            .write_all(self.render(request).as_bytes())
            .and_then(|()| file.sync_all())
            .and_then(|()| fs::set_permissions(&self.path, Permissions::from_mode(SCRIPT_MODE)));
        if let Err(e) = written {
            drop(file);
            let _ = fs::remove_file(&self.path);
            return Err(SupervisorError::registration(format!(
                "cannot write {}: {e}",
                self.path.display()
            )));
        }

        tracing::info!(path = %self.path.display(), "init script installed");
        Ok(())
    }

    /// Removes the script.
    ///
    /// # Errors
    /// `NotInstalled` if there is no script, `Registration` if it cannot be
    /// removed.
    pub fn uninstall(&self) -> Result<()> {
        fs::remove_file(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => SupervisorError::NotInstalled(self.path.display().to_string()),
            _ => SupervisorError::registration(format!(
                "cannot remove {}: {e}",
                self.path.display()
            )),
        })?;
        tracing::info!(path = %self.path.display(), "init script removed");
        Ok(())
    }
}

/// Quotes `arg` for /bin/sh unless it only holds safe characters.
#[must_use]
pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

fn quote_all(args: &[String]) -> String {
    args.iter()
        .map(|a| shell_quote(a))
        .collect::<Vec<_>>()
        .join(" ")
}
