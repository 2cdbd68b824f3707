//! Service registration through the Service Control Manager.

use windows::Win32::Foundation::{ERROR_SERVICE_DOES_NOT_EXIST, ERROR_SERVICE_EXISTS};
use windows::Win32::System::Services::{
    CreateServiceW, DeleteService, OpenSCManagerW, OpenServiceW, SC_MANAGER_ALL_ACCESS,
    SERVICE_ALL_ACCESS, SERVICE_DEMAND_START, SERVICE_ERROR_NORMAL, SERVICE_WIN32_OWN_PROCESS,
};
use windows::core::PCWSTR;

use vigil_core::{InstallRequest, Result, SupervisorError};

use super::handles::ScHandle;
use super::{eventlog, quote_arg, wide};

/// Binary path registered with the SCM: the quoted supervisor followed by
/// its service arguments.
#[must_use]
pub fn binary_path(request: &InstallRequest) -> String {
    let mut line = quote_arg(&request.supervisor.display().to_string());
    for arg in request.service_args() {
        line.push(' ');
        line.push_str(&quote_arg(&arg));
    }
    line
}

fn open_manager() -> Result<ScHandle> {
    // SAFETY: null machine and database names select the local SCM.
    unsafe { OpenSCManagerW(PCWSTR::null(), PCWSTR::null(), SC_MANAGER_ALL_ACCESS) }
        .map(ScHandle)
        .map_err(|e| SupervisorError::registration(format!("cannot open service manager: {e}")))
}

/// Creates the service and its event source.
///
/// # Errors
/// `AlreadyInstalled` if the service exists, `Registration` on any other
/// SCM failure.
pub fn install(service_name: &str, request: &InstallRequest) -> Result<()> {
    let manager = open_manager()?;
    let name = wide(service_name);
    let path = wide(binary_path(request));

    // SAFETY: every string argument is NUL-terminated and outlives the call.
    let created = unsafe {
        CreateServiceW(
            manager.handle(),
            PCWSTR(name.as_ptr()),
            PCWSTR(name.as_ptr()),
            SERVICE_ALL_ACCESS,
            SERVICE_WIN32_OWN_PROCESS,
            SERVICE_DEMAND_START,
            SERVICE_ERROR_NORMAL,
            PCWSTR(path.as_ptr()),
            PCWSTR::null(),
            None,
            PCWSTR::null(),
            PCWSTR::null(),
            PCWSTR::null(),
        )
    };
    let service = match created {
        Ok(handle) => ScHandle(handle),
        Err(e) if e.code() == ERROR_SERVICE_EXISTS.to_hresult() => {
            return Err(SupervisorError::AlreadyInstalled(service_name.to_string()));
        }
        Err(e) => {
            return Err(SupervisorError::registration(format!(
                "CreateServiceW failed: {e}"
            )));
        }
    };
    tracing::info!(service = service_name, "service created");

    rollback_on_error(
        eventlog::register_source(service_name, &request.supervisor),
        || delete_service(&service),
    )
}

/// Passes `result` through; on error runs `undo` first so a failed install
/// leaves nothing registered.
fn rollback_on_error<F>(result: Result<()>, undo: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    if let Err(e) = &result {
        tracing::warn!(error = %e, "install failed, removing service");
        if let Err(undo_err) = undo() {
            tracing::error!(error = %undo_err, "service left registered");
        }
    }
    result
}

fn delete_service(service: &ScHandle) -> Result<()> {
    // SAFETY: service is an open handle with DELETE access.
    unsafe { DeleteService(service.handle()) }
        .map_err(|e| SupervisorError::registration(format!("DeleteService failed: {e}")))
}

/// Deletes the service and, best effort, its event source.
///
/// # Errors
/// `NotInstalled` if the service does not exist, `Registration` on any other
/// SCM failure.
pub fn uninstall(service_name: &str) -> Result<()> {
    let manager = open_manager()?;
    let name = wide(service_name);

    // SAFETY: name is NUL-terminated and outlives the call.
    let service = match unsafe {
        OpenServiceW(manager.handle(), PCWSTR(name.as_ptr()), SERVICE_ALL_ACCESS)
    } {
        Ok(handle) => ScHandle(handle),
        Err(e) if e.code() == ERROR_SERVICE_DOES_NOT_EXIST.to_hresult() => {
            return Err(SupervisorError::NotInstalled(service_name.to_string()));
        }
        Err(e) => {
            return Err(SupervisorError::registration(format!("OpenServiceW failed: {e}")));
        }
    };

    delete_service(&service)?;
    tracing::info!(service = service_name, "service deleted");

    if let Err(e) = eventlog::remove_source(service_name) {
        tracing::warn!(error = %e, "event source left behind");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_binary_path_quotes_paths_with_spaces() {
        let request = InstallRequest {
            supervisor: PathBuf::from(r"C:\Program Files\PubSubSQL\vigil.exe"),
            engine: PathBuf::from(r"C:\Program Files\PubSubSQL\pubsubsql.exe"),
            options: vec!["--port".to_string(), "7777".to_string()],
            config: None,
        };
        assert_eq!(
            binary_path(&request),
            r#""C:\Program Files\PubSubSQL\vigil.exe" svc "C:\Program Files\PubSubSQL\pubsubsql.exe" --port 7777"#
        );
    }

    #[test]
    fn test_failed_event_source_removes_service() {
        let mut undone = false;
        let result = rollback_on_error(
            Err(SupervisorError::registration("access denied")),
            || {
                undone = true;
                Ok(())
            },
        );
        assert!(matches!(result, Err(SupervisorError::Registration(_))));
        assert!(undone);
    }

    #[test]
    fn test_rollback_failure_keeps_original_error() {
        let result = rollback_on_error(Err(SupervisorError::registration("access denied")), || {
            Err(SupervisorError::registration("DeleteService failed"))
        });
        assert!(result.unwrap_err().to_string().contains("access denied"));
    }

    #[test]
    fn test_successful_install_is_kept() {
        let mut undone = false;
        rollback_on_error(Ok(()), || {
            undone = true;
            Ok(())
        })
        .unwrap();
        assert!(!undone);
    }
}
