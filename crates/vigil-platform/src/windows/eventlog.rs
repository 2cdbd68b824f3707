//! Windows Event Log sink and event source registration.

use std::path::Path;

use windows::Win32::Foundation::HANDLE;
use windows::Win32::System::EventLog::{
    DeregisterEventSource, EVENTLOG_ERROR_TYPE, EVENTLOG_INFORMATION_TYPE,
    EVENTLOG_WARNING_TYPE, REPORT_EVENT_TYPE, RegisterEventSourceW, ReportEventW,
};
use windows::Win32::System::Registry::{
    HKEY, HKEY_LOCAL_MACHINE, KEY_WRITE, REG_DWORD, REG_OPTION_NON_VOLATILE, REG_SZ,
    REG_VALUE_TYPE, RegCreateKeyExW, RegDeleteKeyW, RegSetValueExW,
};
use windows::core::PCWSTR;

use vigil_core::{Result, Severity, SupervisorError, SystemLog};

use super::handles::RegKey;
use super::wide;

/// Event categories supported by the source: error, warning, information.
const TYPES_SUPPORTED: u32 = 7;

fn source_key(source: &str) -> String {
    format!("SYSTEM\\CurrentControlSet\\Services\\EventLog\\Application\\{source}")
}

const fn event_type(severity: Severity) -> REPORT_EVENT_TYPE {
    match severity {
        Severity::Information => EVENTLOG_INFORMATION_TYPE,
        Severity::Warning => EVENTLOG_WARNING_TYPE,
        Severity::Error => EVENTLOG_ERROR_TYPE,
    }
}

/// Event Log sink for one registered source.
pub struct EventLog {
    handle: HANDLE,
}

// SAFETY: event log handles may be used from any thread; ReportEventW
// serializes internally.
unsafe impl Send for EventLog {}
// SAFETY: see above.
unsafe impl Sync for EventLog {}

impl EventLog {
    /// Opens the event source `source` on the local machine.
    ///
    /// # Errors
    /// Fails if the source cannot be opened.
    pub fn open(source: &str) -> Result<Self> {
        let name = wide(source);
        // SAFETY: name is NUL-terminated and outlives the call.
        let handle = unsafe { RegisterEventSourceW(PCWSTR::null(), PCWSTR(name.as_ptr())) }
            .map_err(|e| SupervisorError::platform(format!("RegisterEventSourceW failed: {e}")))?;
        Ok(Self { handle })
    }
}

impl SystemLog for EventLog {
    fn write(&self, severity: Severity, message: &str) {
        report(self.handle, severity, message);
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        // SAFETY: the handle came from RegisterEventSourceW and is released once.
        unsafe {
            let _ = DeregisterEventSource(self.handle);
        }
    }
}

fn report(handle: HANDLE, severity: Severity, message: &str) {
    let text = wide(message);
    let strings = [PCWSTR(text.as_ptr())];
    // SAFETY: strings points at one NUL-terminated buffer alive for the call.
    let reported = unsafe {
        ReportEventW(
            handle,
            event_type(severity),
            0,
            0,
            None,
            0,
            Some(&strings),
            None,
        )
    };
    if let Err(e) = reported {
        tracing::debug!(error = %e, "ReportEventW failed");
    }
}

/// Writes a single entry through a temporary source handle.
pub fn report_once(source: &str, severity: Severity, message: &str) {
    match EventLog::open(source) {
        Ok(log) => log.write(severity, message),
        Err(e) => tracing::debug!(error = %e, "event log unavailable"),
    }
}

/// Registers `source` under the Application log with `message_file` as its
/// EventMessageFile.
///
/// # Errors
/// Fails if the registry key cannot be created or written.
pub fn register_source(source: &str, message_file: &Path) -> Result<()> {
    let key_path = wide(source_key(source));
    let mut key = HKEY::default();
    // SAFETY: key_path is NUL-terminated and key receives the new handle.
    unsafe {
        RegCreateKeyExW(
            HKEY_LOCAL_MACHINE,
            PCWSTR(key_path.as_ptr()),
            None,
            PCWSTR::null(),
            REG_OPTION_NON_VOLATILE,
            KEY_WRITE,
            None,
            &mut key,
            None,
        )
    }
    .ok()
    .map_err(|e| SupervisorError::registration(format!("cannot create event source key: {e}")))?;
    let key = RegKey(key);

    let file = wide(message_file);
    set_value(&key, "EventMessageFile", REG_SZ, as_bytes(&file))?;
    set_value(&key, "TypesSupported", REG_DWORD, &TYPES_SUPPORTED.to_le_bytes())?;
    tracing::info!(source, "event source registered");
    Ok(())
}

/// Removes the registry key for `source`.
///
/// # Errors
/// Fails if the key exists but cannot be deleted.
pub fn remove_source(source: &str) -> Result<()> {
    let key_path = wide(source_key(source));
    // SAFETY: key_path is NUL-terminated.
    unsafe { RegDeleteKeyW(HKEY_LOCAL_MACHINE, PCWSTR(key_path.as_ptr())) }
        .ok()
        .map_err(|e| SupervisorError::registration(format!("cannot delete event source key: {e}")))
}

fn set_value(key: &RegKey, name: &str, kind: REG_VALUE_TYPE, data: &[u8]) -> Result<()> {
    let name_w = wide(name);
    // SAFETY: name_w is NUL-terminated and data is a valid slice.
    unsafe { RegSetValueExW(key.handle(), PCWSTR(name_w.as_ptr()), None, kind, Some(data)) }
        .ok()
        .map_err(|e| SupervisorError::registration(format!("cannot set {name}: {e}")))
}

fn as_bytes(buffer: &[u16]) -> &[u8] {
    // SAFETY: u16 has no padding and the byte view covers the same memory.
    unsafe { std::slice::from_raw_parts(buffer.as_ptr().cast::<u8>(), buffer.len() * 2) }
}
