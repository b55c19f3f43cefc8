//! Operator shell escape.
//!
//! Lines starting with the escape prefix are handed to the host shell as-is.
//! stderr is redirected into stdout inside the shell so the captured text
//! keeps the order in which the command wrote it.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

/// Runs operator commands through a POSIX shell.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    shell: String,
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new("sh")
    }
}

impl CommandDispatcher {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// Run `command` and return everything it printed.
    ///
    /// A non-zero exit status is not an error; only failing to start the
    /// shell is. Dropping the returned future kills the child.
    pub async fn run(&self, command: &str) -> Result<String> {
        info!(command, "Executing operator command");

        let script = format!("exec 2>&1\n{command}");
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(&script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to start {}", self.shell))?;

        debug!(
            status = ?output.status.code(),
            bytes = output.stdout.len(),
            "Operator command finished"
        );
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
