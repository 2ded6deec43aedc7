//! PID-file liveness tests

use liveness::process_alive;
use std::io::Write;

#[test]
fn test_running_process_with_padded_pid() {
    let pid = std::process::id() as i32;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "  {}\n", pid).unwrap();

    assert_eq!(process_alive(file.path()), pid);
}

#[test]
fn test_missing_pid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keepalived.pid");

    assert_eq!(process_alive(&path), 0);
}

#[test]
fn test_non_numeric_pid_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "not-a-pid").unwrap();

    assert_eq!(process_alive(file.path()), 0);
}

#[test]
fn test_exited_process() {
    let mut child = std::process::Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{}", pid).unwrap();

    // The reaped PID is free; it is only alive again if the kernel recycled it.
    let alive = process_alive(file.path());
    assert!(alive == 0 || alive == pid as i32);
}
