//! Windows process termination using TerminateProcess API

use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0};
use windows::Win32::System::Threading::{
    OpenProcess, TerminateProcess, WaitForSingleObject, PROCESS_QUERY_LIMITED_INFORMATION,
    PROCESS_SYNCHRONIZE, PROCESS_TERMINATE,
};

use crate::model::KillOutcome;

const FORCE_TIMEOUT_MS: u32 = 1000;

const ERROR_ACCESS_DENIED: u32 = 5;
const ERROR_INVALID_PARAMETER: u32 = 87;
const ERROR_NOT_FOUND: u32 = 1168;

pub fn terminate_pid(pid: u32) -> KillOutcome {
    unsafe {
        let handle = match OpenProcess(
            PROCESS_TERMINATE | PROCESS_SYNCHRONIZE | PROCESS_QUERY_LIMITED_INFORMATION,
            false,
            pid,
        ) {
            Ok(h) => h,
            Err(e) => {
                let code = win32_code(&e);
                if code == ERROR_INVALID_PARAMETER || code == ERROR_NOT_FOUND {
                    return KillOutcome::AlreadyExited;
                }
                if code == ERROR_ACCESS_DENIED {
                    return KillOutcome::PermissionDenied;
                }
                log::error!("OpenProcess({}) failed: {:?}", pid, e);
                return KillOutcome::Failed(code as i32);
            }
        };

        let outcome = match TerminateProcess(handle, 1) {
            Ok(()) => {
                if wait_for_exit(handle, FORCE_TIMEOUT_MS) {
                    KillOutcome::Success
                } else {
                    KillOutcome::TimedOut
                }
            }
            Err(e) => {
                let code = win32_code(&e);
                if code == ERROR_ACCESS_DENIED {
                    // Also returned when the process is already exiting
                    if wait_for_exit(handle, 0) {
                        KillOutcome::AlreadyExited
                    } else {
                        KillOutcome::PermissionDenied
                    }
                } else if code == ERROR_INVALID_PARAMETER || code == ERROR_NOT_FOUND {
                    KillOutcome::AlreadyExited
                } else {
                    KillOutcome::Failed(code as i32)
                }
            }
        };
        let _ = CloseHandle(handle);
        outcome
    }
}

/// Low word of the HRESULT carries the Win32 error code.
fn win32_code(e: &windows::core::Error) -> u32 {
    (e.code().0 as u32) & 0xFFFF
}

/// Wait for process to exit
unsafe fn wait_for_exit(handle: HANDLE, timeout_ms: u32) -> bool {
    // SAFETY: handle is valid and was opened with SYNCHRONIZE
    let result = unsafe { WaitForSingleObject(handle, timeout_ms) };
    result == WAIT_OBJECT_0
}
