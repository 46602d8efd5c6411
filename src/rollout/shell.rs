//! Remote command execution.

use crate::error::{CliError, ReleaseError, Result, RolloutError};
use crate::process::{self, CommandOutput, shell_quote};
use std::future::Future;
use std::path::Path;
use std::time::Duration;

/// Exit status `ssh` uses for its own connection failures
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Runs commands on remote hosts
pub trait RemoteShell {
    /// Run `command` on `host`, inside `cwd` when given
    ///
    /// A command that runs and exits non-zero is `Ok` with an unsuccessful
    /// [`CommandOutput`]; transport problems are errors.
    fn run(
        &self,
        host: &str,
        command: &str,
        cwd: Option<&str>,
        timeout: Duration,
    ) -> impl Future<Output = Result<CommandOutput>>;

    /// Copy `remote_path` on `host` to `local_path`
    fn fetch(
        &self,
        host: &str,
        remote_path: &str,
        local_path: &Path,
        timeout: Duration,
    ) -> impl Future<Output = Result<()>>;
}

/// [`RemoteShell`] backed by the system `ssh` and `scp` clients
#[derive(Debug, Clone, Default)]
pub struct SshShell {
    forward_agent: bool,
}

impl SshShell {
    /// Shell using non-interactive `ssh`
    pub fn new() -> Result<Self> {
        for program in ["ssh", "scp"] {
            if which::which(program).is_err() {
                return Err(CliError::ExecutionFailed {
                    command: program.to_string(),
                    reason: "not found in PATH".to_string(),
                }
                .into());
            }
        }
        Ok(Self::default())
    }

    /// Forward the local agent so remote commands can reach other hosts
    pub fn with_agent_forwarding(mut self) -> Self {
        self.forward_agent = true;
        self
    }

    fn remote_line(command: &str, cwd: Option<&str>) -> String {
        match cwd {
            Some(dir) => format!("cd {} && {}", shell_quote(dir), command),
            None => command.to_string(),
        }
    }
}

/// Map local process errors onto the host being driven
fn host_error(host: &str, command: &str, error: ReleaseError) -> ReleaseError {
    match error {
        ReleaseError::Cli(CliError::Timeout { seconds, .. }) => RolloutError::Timeout {
            host: host.to_string(),
            command: command.to_string(),
            seconds,
        }
        .into(),
        other => other,
    }
}

impl RemoteShell for SshShell {
    async fn run(
        &self,
        host: &str,
        command: &str,
        cwd: Option<&str>,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        let line = Self::remote_line(command, cwd);
        let mut args = vec!["-o", "BatchMode=yes"];
        if self.forward_agent {
            args.push("-A");
        }
        args.push(host);
        args.push(&line);

        log::info!("[{}] {}", host, line);
        let output = process::run_program("ssh", &args, Path::new("."), Some(timeout))
            .await
            .map_err(|e| host_error(host, command, e))?;
        if output.exit_code == Some(SSH_CONNECTION_FAILURE) {
            return Err(RolloutError::HostUnreachable {
                host: host.to_string(),
                reason: output.failure_reason(),
            }
            .into());
        }
        Ok(output)
    }

    async fn fetch(
        &self,
        host: &str,
        remote_path: &str,
        local_path: &Path,
        timeout: Duration,
    ) -> Result<()> {
        let source = format!("{}:{}", host, remote_path);
        let target = local_path.to_string_lossy();
        let args = ["-o", "BatchMode=yes", source.as_str(), target.as_ref()];
        let output = process::run_program("scp", &args, Path::new("."), Some(timeout))
            .await
            .map_err(|e| host_error(host, &format!("scp {}", source), e))?;
        if !output.success {
            return Err(CliError::ExecutionFailed {
                command: format!("scp {} {}", source, target),
                reason: output.failure_reason(),
            }
            .into());
        }
        Ok(())
    }
}
