//! PID-file based process liveness.

use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::path::Path;
use tracing::debug;

/// Return the PID recorded in `pid_file` if that process is alive, 0 otherwise.
///
/// The file holds one integer, optionally surrounded by whitespace. A missing
/// file, unparsable content, a non-positive PID, or a rejected null signal all
/// yield 0; callers only learn liveness, never the reason.
pub fn process_alive(pid_file: impl AsRef<Path>) -> i32 {
    let path = pid_file.as_ref();

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "PID file unreadable");
            return 0;
        }
    };

    let pid = match contents.trim().parse::<i32>() {
        Ok(pid) if pid > 0 => pid,
        _ => {
            debug!(path = %path.display(), "PID file content is not a valid PID");
            return 0;
        }
    };

    // Signal 0 performs permission and existence checks only.
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => pid,
        Err(errno) => {
            debug!(pid, error = %errno, "Process not signalable");
            0
        }
    }
}
