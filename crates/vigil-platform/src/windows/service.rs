//! SCM dispatcher, control handler, and status reporting.
//!
//! `StartServiceCtrlDispatcherW` calls [`service_main`] on its own thread
//! without any user context, so the launch parameters are parked in a
//! `OnceLock` first. The control handler receives the [`ServiceRuntime`]
//! as its context pointer; the runtime lives in a static so the pointer
//! stays valid for as long as the SCM may call back.

use std::ffi::c_void;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use windows::Win32::Foundation::{
    ERROR_CALL_NOT_IMPLEMENTED, ERROR_FAILED_SERVICE_CONTROLLER_CONNECT,
    ERROR_SERVICE_SPECIFIC_ERROR, NO_ERROR,
};
use windows::Win32::System::Services::{
    RegisterServiceCtrlHandlerExW, SERVICE_ACCEPT_STOP, SERVICE_CONTROL_INTERROGATE,
    SERVICE_CONTROL_SHUTDOWN, SERVICE_CONTROL_STOP, SERVICE_RUNNING, SERVICE_START_PENDING,
    SERVICE_STATUS, SERVICE_STATUS_CURRENT_STATE, SERVICE_STATUS_HANDLE, SERVICE_STOP_PENDING,
    SERVICE_STOPPED, SERVICE_TABLE_ENTRYW, SERVICE_WIN32_OWN_PROCESS, SetServiceStatus,
    StartServiceCtrlDispatcherW,
};
use windows::core::{PCWSTR, PWSTR};

use vigil_core::{
    InstallRequest, Launch, Result, ServiceHost, ServicePhase, ServiceRuntime, StatusRecord,
    StatusReporter, SupervisorConfig, SupervisorError, SystemLog, TracingReporter, supervise,
};

use super::eventlog::EventLog;
use super::{scm, wide};
use crate::fatal::{FATAL_EXIT, require};

/// Upper bound on waiting for blocking pipe reads once the engine is gone.
const RUNTIME_SHUTDOWN: Duration = Duration::from_secs(1);

static LAUNCH: OnceLock<Launch> = OnceLock::new();
static RUNTIME: OnceLock<Arc<ServiceRuntime>> = OnceLock::new();
static EXIT_CODE: AtomicI32 = AtomicI32::new(FATAL_EXIT);

/// Service host for Windows.
#[derive(Debug, Clone)]
pub struct ScmHost {
    config: SupervisorConfig,
}

impl ScmHost {
    /// Creates a host for the service named in `config`.
    #[must_use]
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config }
    }
}

impl ServiceHost for ScmHost {
    fn install(&self, request: &InstallRequest) -> Result<()> {
        scm::install(&self.config.service_name, request)
    }

    fn uninstall(&self) -> Result<()> {
        scm::uninstall(&self.config.service_name)
    }

    /// Hands control to the SCM dispatcher, which blocks until the service
    /// reports Stopped. With `--foreground` and no SCM connection the
    /// engine is supervised from the console instead, stopped by Ctrl-C.
    fn run(&self, launch: Launch) -> Result<i32> {
        let foreground = launch.foreground;
        if LAUNCH.set(launch).is_err() {
            return Err(SupervisorError::state("service already launched"));
        }

        let mut name = wide(&self.config.service_name);
        let table = [
            SERVICE_TABLE_ENTRYW {
                lpServiceName: PWSTR(name.as_mut_ptr()),
                lpServiceProc: Some(service_main),
            },
            SERVICE_TABLE_ENTRYW::default(),
        ];

        // SAFETY: table is terminated by a null entry and outlives the call,
        // which returns only after every service in it has stopped.
        match unsafe { StartServiceCtrlDispatcherW(table.as_ptr()) } {
            Ok(()) => Ok(EXIT_CODE.load(Ordering::SeqCst)),
            Err(e)
                if foreground
                    && e.code() == ERROR_FAILED_SERVICE_CONTROLLER_CONNECT.to_hresult() =>
            {
                run_console(&self.config)
            }
            Err(e) => {
                require::<(), _>(Err(e), "StartServiceCtrlDispatcherW");
                Ok(FATAL_EXIT)
            }
        }
    }
}

fn run_console(config: &SupervisorConfig) -> Result<i32> {
    let launch = LAUNCH
        .get()
        .ok_or_else(|| SupervisorError::state("launch parameters missing"))?;
    let sink: Arc<dyn SystemLog> = Arc::new(EventLog::open(&config.service_name)?);
    let rt = build_runtime()?;
    let service_name = config.service_name.clone();
    let code = rt.block_on(async move {
        let runtime = Arc::new(
            ServiceRuntime::new(Box::new(TracingReporter::new(service_name)))
                .with_stop_hint(launch.config.stop_wait_hint()),
        );
        let stopper = Arc::clone(&runtime);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stopper.request_stop();
            }
        });
        supervise(runtime, &launch.command(), &launch.config, sink)
            .await
            .exit_code()
    });
    rt.shutdown_timeout(RUNTIME_SHUTDOWN);
    Ok(code)
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| SupervisorError::platform(format!("failed to build runtime: {e}")))
}

unsafe extern "system" fn service_main(_argc: u32, _argv: *mut PWSTR) {
    let code = match LAUNCH.get() {
        Some(launch) => run_service(launch),
        None => FATAL_EXIT,
    };
    EXIT_CODE.store(code, Ordering::SeqCst);
}

fn run_service(launch: &Launch) -> i32 {
    let config = &launch.config;
    let status_handle = Arc::new(OnceLock::new());
    let runtime = RUNTIME.get_or_init(|| {
        Arc::new(
            ServiceRuntime::new(Box::new(ScmReporter {
                handle: Arc::clone(&status_handle),
            }))
            .with_stop_hint(config.stop_wait_hint()),
        )
    });

    let name = wide(&config.service_name);
    // SAFETY: name is NUL-terminated; the context points at a runtime kept
    // alive by RUNTIME for the rest of the process.
    let registered = unsafe {
        RegisterServiceCtrlHandlerExW(
            PCWSTR(name.as_ptr()),
            Some(control_handler),
            Some(Arc::as_ptr(runtime).cast::<c_void>()),
        )
    };
    match registered {
        Ok(handle) => {
            let _ = status_handle.set(StatusHandle(handle));
        }
        Err(e) => {
            tracing::error!(error = %e, "RegisterServiceCtrlHandlerExW failed");
            return FATAL_EXIT;
        }
    }

    let sink: Arc<dyn SystemLog> = match EventLog::open(&config.service_name) {
        Ok(log) => Arc::new(log),
        Err(e) => {
            tracing::error!(error = %e, "event log unavailable");
            runtime.report_stopped(FATAL_EXIT as u32);
            return FATAL_EXIT;
        }
    };

    let rt = match build_runtime() {
        Ok(rt) => rt,
        Err(e) => {
            sink.write(vigil_core::Severity::Error, &e.to_string());
            runtime.report_stopped(FATAL_EXIT as u32);
            return FATAL_EXIT;
        }
    };

    let command = launch.command();
    let code = rt.block_on(supervise(Arc::clone(runtime), &command, config, sink));
    rt.shutdown_timeout(RUNTIME_SHUTDOWN);
    code.exit_code()
}

unsafe extern "system" fn control_handler(
    control: u32,
    _event_type: u32,
    _event_data: *mut c_void,
    context: *mut c_void,
) -> u32 {
    match control {
        SERVICE_CONTROL_STOP | SERVICE_CONTROL_SHUTDOWN => {
            // SAFETY: context is the ServiceRuntime registered in run_service,
            // owned by RUNTIME and never freed.
            let runtime = unsafe { &*context.cast::<ServiceRuntime>().cast_const() };
            runtime.request_stop();
            NO_ERROR.0
        }
        SERVICE_CONTROL_INTERROGATE => NO_ERROR.0,
        _ => ERROR_CALL_NOT_IMPLEMENTED.0,
    }
}

struct StatusHandle(SERVICE_STATUS_HANDLE);

// SAFETY: SetServiceStatus may be called from any thread with this handle.
unsafe impl Send for StatusHandle {}
// SAFETY: see above.
unsafe impl Sync for StatusHandle {}

/// Publishes status records with `SetServiceStatus`.
struct ScmReporter {
    handle: Arc<OnceLock<StatusHandle>>,
}

const fn current_state(phase: ServicePhase) -> SERVICE_STATUS_CURRENT_STATE {
    match phase {
        ServicePhase::StartPending => SERVICE_START_PENDING,
        ServicePhase::Running => SERVICE_RUNNING,
        ServicePhase::StopPending => SERVICE_STOP_PENDING,
        ServicePhase::Stopped => SERVICE_STOPPED,
    }
}

impl StatusReporter for ScmReporter {
    fn report(&self, record: &StatusRecord) {
        let Some(handle) = self.handle.get() else {
            tracing::warn!(phase = ?record.phase, "status handle not registered yet");
            return;
        };
        let status = SERVICE_STATUS {
            dwServiceType: SERVICE_WIN32_OWN_PROCESS,
            dwCurrentState: current_state(record.phase),
            dwControlsAccepted: if record.accepts_stop {
                SERVICE_ACCEPT_STOP
            } else {
                0
            },
            dwWin32ExitCode: if record.exit_code == 0 {
                NO_ERROR.0
            } else {
                ERROR_SERVICE_SPECIFIC_ERROR.0
            },
            dwServiceSpecificExitCode: record.exit_code,
            dwCheckPoint: record.checkpoint,
            dwWaitHint: u32::try_from(record.wait_hint.as_millis()).unwrap_or(u32::MAX),
        };
        // SAFETY: handle came from RegisterServiceCtrlHandlerExW and status
        // is a fully initialized SERVICE_STATUS.
        if let Err(e) = unsafe { SetServiceStatus(handle.0, &status) } {
            tracing::warn!(error = %e, phase = ?record.phase, "SetServiceStatus failed");
        }
    }
}
