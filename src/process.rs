//! Local process execution with output capture and bounded waits.
//!
//! Every external program this tool drives (VCS clients, the release tool,
//! `ssh`, `scp`) goes through here so timeouts and diagnostics are uniform.

use crate::error::{CliError, ReleaseError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Result of a command execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Whether the command succeeded (exit code 0)
    pub success: bool,
    /// Exit code (if available)
    pub exit_code: Option<i32>,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Duration of execution
    pub duration_ms: u64,
}

impl CommandOutput {
    /// Successful output carrying `stdout`, used by fakes and adapters
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            stderr: stderr.into(),
            ..Self::default()
        }
    }

    /// Short human-readable reason for a failure
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr.trim();
        let detail = if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        };
        match self.exit_code {
            Some(code) if detail.is_empty() => format!("exit code {}", code),
            Some(code) => format!("exit code {}: {}", code, detail),
            None if detail.is_empty() => "terminated by signal".to_string(),
            None => format!("terminated by signal: {}", detail),
        }
    }

    /// Non-empty stdout lines, trimmed
    pub fn stdout_lines(&self) -> Vec<String> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Run `program` with `args` in `cwd`, waiting at most `timeout`
pub async fn run_program(
    program: &str,
    args: &[&str],
    cwd: &Path,
    timeout: Option<Duration>,
) -> Result<CommandOutput> {
    let mut command = Command::new(program);
    command.args(args).current_dir(cwd);
    let display = format!("{} {}", program, args.join(" "));
    execute(command, display, timeout).await
}

/// Run a shell command line through `sh -c` in `cwd`
pub async fn run_shell(command_line: &str, cwd: &Path, timeout: Option<Duration>) -> Result<CommandOutput> {
    let mut command = Command::new("sh");
    command.arg("-c").arg(command_line).current_dir(cwd);
    execute(command, command_line.to_string(), timeout).await
}

async fn execute(
    mut command: Command,
    display: String,
    timeout: Option<Duration>,
) -> Result<CommandOutput> {
    log::debug!("running: {}", display);
    let start = Instant::now();

    let child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn: {}", display))?;

    let output = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(result) => result,
            Err(_elapsed) => {
                // kill_on_drop reaps the abandoned child
                log::warn!("'{}' exceeded {}s, terminated", display, limit.as_secs());
                return Err(ReleaseError::Cli(CliError::Timeout {
                    command: display,
                    seconds: limit.as_secs(),
                }));
            }
        },
        None => child.wait_with_output().await,
    }
    .with_context(|| format!("failed to wait for: {}", display))?;

    let result = CommandOutput {
        success: output.status.success(),
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    log::debug!(
        "finished: {} ({:?}, {}ms)",
        display,
        result.exit_code,
        result.duration_ms
    );
    Ok(result)
}

/// Quote a value for inclusion in a POSIX shell command line
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:@=+,".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}
