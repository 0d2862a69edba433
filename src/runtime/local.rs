//! NL-008: Local script execution via `bash`.
//!
//! Generated scripts use `set -o pipefail`, so bash rather than sh/dash.

use crate::core::error::{LaunchError, LaunchResult};
use std::io::Write;
use std::process::{Child, Command, Stdio};

/// Run a script with inherited stdout/stderr until it exits; returns the exit code.
pub fn run_local(script: &str) -> LaunchResult<i32> {
    let mut child = spawn_bash(script)?;
    let status = child
        .wait()
        .map_err(|e| LaunchError::Runtime(format!("wait error: {}", e)))?;
    Ok(status.code().unwrap_or(-1))
}

fn spawn_bash(script: &str) -> LaunchResult<Child> {
    let mut child = Command::new("bash")
        .stdin(Stdio::piped())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| LaunchError::Runtime(format!("failed to spawn bash: {}", e)))?;

    // stdin is dropped at the end of this block so bash sees EOF
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(script.as_bytes())
            .map_err(|e| LaunchError::Runtime(format!("stdin write error: {}", e)))?;
    }
    Ok(child)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nl008_run_local_exit_code() {
        assert_eq!(run_local("exit 3").unwrap(), 3);
        assert_eq!(run_local("true").unwrap(), 0);
    }

    #[test]
    fn test_nl008_local_env_export() {
        assert_eq!(run_local("export X='a b'\n[ \"$X\" = 'a b' ]").unwrap(), 0);
    }

    #[test]
    fn test_nl008_local_pipefail() {
        assert_ne!(run_local("set -euo pipefail\nfalse | true").unwrap(), 0);
    }
}
