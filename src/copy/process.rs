//! Child process helpers: own process group, tree kill, bounded wait.

use std::process::{Child, Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const WAIT_POLL: Duration = Duration::from_millis(50);

/// Start the child in its own process group so the whole tree can be signalled.
#[cfg(unix)]
pub fn isolate_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(windows)]
pub fn isolate_process_group(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

#[cfg(unix)]
fn kill_tree(child: &Child) -> bool {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return false;
    };
    // SAFETY: signalling a process group we created; no memory is shared.
    unsafe { libc::kill(-pgid, libc::SIGKILL) == 0 }
}

#[cfg(windows)]
fn kill_tree(child: &Child) -> bool {
    std::process::Command::new("taskkill")
        .args(["/PID", &child.id().to_string(), "/T", "/F"])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Kill the child and its descendants; falls back to killing the child alone.
pub fn kill_process_tree(child: &mut Child) {
    if kill_tree(child) {
        debug!(pid = child.id(), "process tree killed");
        return;
    }
    if let Err(e) = child.kill() {
        warn!(pid = child.id(), error = %e, "failed to kill copy tool");
    }
}

/// Poll for exit for at most `timeout`. `None` if the child is still running.
pub fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) if Instant::now() < deadline => thread::sleep(WAIT_POLL),
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "waiting for copy tool failed");
                return None;
            }
        }
    }
}
