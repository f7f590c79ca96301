//! Unix process control via signals

use anyhow::Result;

fn signal(pid: u32, signal: libc::c_int) -> std::io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::from(std::io::ErrorKind::InvalidInput))?;
    // SAFETY: kill(2) has no memory-safety preconditions
    let result = unsafe { libc::kill(pid, signal) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// Terminate a process gracefully (SIGTERM)
pub fn terminate_process(pid: u32) -> Result<()> {
    signal(pid, libc::SIGTERM)
        .map_err(|e| anyhow::anyhow!("Failed to terminate process {}: {}", pid, e))
}

/// Force kill a process (SIGKILL)
pub fn kill_process(pid: u32) -> Result<()> {
    signal(pid, libc::SIGKILL).map_err(|e| anyhow::anyhow!("Failed to kill process {}: {}", pid, e))
}

/// Signal 0 checks existence without delivering anything
pub fn is_process_running(pid: u32) -> bool {
    signal(pid, 0).is_ok()
}
