//! Windows process control

use anyhow::{Context, Result};

use windows::Win32::Foundation::{CloseHandle, FALSE, STILL_ACTIVE};
use windows::Win32::System::Threading::{
    GetExitCodeProcess, OpenProcess, TerminateProcess, PROCESS_QUERY_LIMITED_INFORMATION,
    PROCESS_TERMINATE,
};

fn terminate_with_code(pid: u32, exit_code: u32) -> Result<()> {
    unsafe {
        let handle =
            OpenProcess(PROCESS_TERMINATE, FALSE, pid).context("Failed to open process")?;

        let result = TerminateProcess(handle, exit_code);
        CloseHandle(handle)?;

        result.with_context(|| format!("Failed to terminate process {}", pid))
    }
}

/// Terminate a process; Windows has no polite signal for a GUI child
pub fn terminate_process(pid: u32) -> Result<()> {
    terminate_with_code(pid, 0)
}

/// Force kill a process
pub fn kill_process(pid: u32) -> Result<()> {
    terminate_with_code(pid, 1)
}

/// Check if a process is running
pub fn is_process_running(pid: u32) -> bool {
    unsafe {
        let handle = match OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, FALSE, pid) {
            Ok(h) => h,
            Err(_) => return false,
        };

        let mut exit_code: u32 = 0;
        let result = GetExitCodeProcess(handle, &mut exit_code);
        CloseHandle(handle).ok();

        result.is_ok() && exit_code == STILL_ACTIVE.0 as u32
    }
}
