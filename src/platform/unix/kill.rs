//! Unix process termination using SIGTERM/SIGKILL

use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use crate::model::KillOutcome;

const SIGTERM_GRACE: Duration = Duration::from_secs(1);
const SIGKILL_GRACE: Duration = Duration::from_secs(1);
const POLL_STEP: Duration = Duration::from_millis(100);

pub fn terminate_pid(pid_raw: u32) -> KillOutcome {
    let Ok(raw) = i32::try_from(pid_raw) else {
        return KillOutcome::AlreadyExited;
    };
    if raw <= 0 {
        // 0 and negatives address process groups, never a single target
        return KillOutcome::AlreadyExited;
    }
    let pid = Pid::from_raw(raw);

    // Check if process exists
    match kill(pid, None) {
        Err(Errno::ESRCH) => return KillOutcome::AlreadyExited,
        Err(Errno::EPERM) => return KillOutcome::PermissionDenied,
        Err(err) => return KillOutcome::Failed(err as i32),
        Ok(()) => {}
    }

    let mut last_perm_denied = false;

    match kill(pid, Signal::SIGTERM) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return KillOutcome::AlreadyExited,
        Err(Errno::EPERM) => last_perm_denied = true,
        Err(err) => return KillOutcome::Failed(err as i32),
    }

    match wait_for_exit(pid, SIGTERM_GRACE) {
        Ok(true) => return KillOutcome::Success,
        Ok(false) => {}
        Err(err) => return KillOutcome::Failed(err as i32),
    }

    // Force kill if still running
    match kill(pid, Signal::SIGKILL) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return KillOutcome::Success,
        Err(Errno::EPERM) => last_perm_denied = true,
        Err(err) => return KillOutcome::Failed(err as i32),
    }

    match wait_for_exit(pid, SIGKILL_GRACE) {
        Ok(true) => KillOutcome::Success,
        Ok(false) => {
            if last_perm_denied {
                KillOutcome::PermissionDenied
            } else {
                KillOutcome::TimedOut
            }
        }
        Err(err) => KillOutcome::Failed(err as i32),
    }
}

fn wait_for_exit(pid: Pid, timeout: Duration) -> Result<bool, Errno> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        match kill(pid, None) {
            Err(Errno::ESRCH) => return Ok(true),
            Err(err) => return Err(err),
            Ok(()) => {}
        }

        if std::time::Instant::now() >= deadline {
            return Ok(false);
        }
        thread::sleep(POLL_STEP);
    }
}
