//! Startup command execution.

use std::io;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};

/// Launch `command` through the platform shell in `working_dir`.
///
/// Output goes straight to this process's stdout/stderr so operators can
/// follow the backend's startup. Dropping the handle does not stop the
/// child; long-running servers are expected to outlive the check.
pub(super) fn spawn_shell(command: &str, working_dir: &Path) -> io::Result<Child> {
    let mut cmd = shell_command(command);
    cmd.current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    cmd.spawn()
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("bash");
    cmd.arg("-lc").arg(command);
    cmd
}
