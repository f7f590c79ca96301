//! Platform-specific process control for Unix and Windows

#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub mod unix;

use anyhow::Result;

/// Ask a process to exit
pub fn terminate_process(pid: u32) -> Result<()> {
    #[cfg(windows)]
    {
        windows::terminate_process(pid)
    }
    #[cfg(unix)]
    {
        unix::terminate_process(pid)
    }
    #[cfg(not(any(windows, unix)))]
    {
        let _ = pid;
        anyhow::bail!("Unsupported platform")
    }
}

/// Force kill a process
pub fn kill_process(pid: u32) -> Result<()> {
    #[cfg(windows)]
    {
        windows::kill_process(pid)
    }
    #[cfg(unix)]
    {
        unix::kill_process(pid)
    }
    #[cfg(not(any(windows, unix)))]
    {
        let _ = pid;
        anyhow::bail!("Unsupported platform")
    }
}

/// Check if a process is running
pub fn is_process_running(pid: u32) -> bool {
    #[cfg(windows)]
    {
        windows::is_process_running(pid)
    }
    #[cfg(unix)]
    {
        unix::is_process_running(pid)
    }
    #[cfg(not(any(windows, unix)))]
    {
        let _ = pid;
        false
    }
}
