//! RAII wrappers for Service Control Manager and registry handles.

use windows::Win32::System::Registry::{HKEY, RegCloseKey};
use windows::Win32::System::Services::{CloseServiceHandle, SC_HANDLE};

/// Service Control Manager or service handle, closed on drop.
pub(super) struct ScHandle(pub(super) SC_HANDLE);

impl ScHandle {
    #[inline]
    pub(super) fn handle(&self) -> SC_HANDLE {
        self.0
    }
}

impl Drop for ScHandle {
    fn drop(&mut self) {
        if !self.0.is_invalid() {
            // SAFETY: the handle came from OpenSCManagerW, OpenServiceW, or
            // CreateServiceW and is closed exactly once.
            unsafe {
                let _ = CloseServiceHandle(self.0);
            }
        }
    }
}

/// Registry key handle, closed on drop.
pub(super) struct RegKey(pub(super) HKEY);

impl RegKey {
    #[inline]
    pub(super) fn handle(&self) -> HKEY {
        self.0
    }
}

impl Drop for RegKey {
    fn drop(&mut self) {
        if !self.0.is_invalid() {
            // SAFETY: the key came from RegCreateKeyExW and is closed once.
            unsafe {
                let _ = RegCloseKey(self.0);
            }
        }
    }
}
