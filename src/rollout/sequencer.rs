//! Per-host rollout sequence.
//!
//! Each host walks `Idle → Resolving → Stopping → Switching → Building →
//! Starting → Done`. The supervisor is restarted even when the switch or the
//! build failed, so a broken rollout never leaves the host's services down.

use super::RemoteShell;
use crate::config::{RolloutConfig, TargetPlan};
use crate::error::{ReleaseError, Result, RolloutError};
use crate::process::CommandOutput;
use futures::future::join_all;
use std::fmt;
use std::time::{Duration, Instant};

/// Where a host's rollout currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPhase {
    /// Not started
    Idle,
    /// Checking the buildout directory exists
    Resolving,
    /// Stopping supervised processes
    Stopping,
    /// Switching the working copy to the tag
    Switching,
    /// Running the build command
    Building,
    /// Starting supervised processes
    Starting,
    /// All steps succeeded
    Done,
    /// At least one step failed
    Failed,
}

impl fmt::Display for HostPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostPhase::Idle => "idle",
            HostPhase::Resolving => "resolving",
            HostPhase::Stopping => "stopping",
            HostPhase::Switching => "switching",
            HostPhase::Building => "building",
            HostPhase::Starting => "starting",
            HostPhase::Done => "done",
            HostPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of one host's sequence
#[derive(Debug, Clone)]
pub struct HostReport {
    /// Host name
    pub host: String,
    /// Final phase, [`HostPhase::Done`] or [`HostPhase::Failed`]
    pub phase: HostPhase,
    /// Phase in which the first error happened
    pub failed_in: Option<HostPhase>,
    /// Every error met on the way, in order
    pub errors: Vec<RolloutError>,
    /// Wall time spent on the host
    pub duration: Duration,
}

impl HostReport {
    fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            phase: HostPhase::Idle,
            failed_in: None,
            errors: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Whether every step succeeded
    pub fn succeeded(&self) -> bool {
        self.phase == HostPhase::Done
    }

    fn fail(&mut self, error: RolloutError) {
        log::warn!("[{}] {} failed: {}", self.host, self.phase, error);
        if self.failed_in.is_none() {
            self.failed_in = Some(self.phase);
        }
        self.errors.push(error);
    }

    fn finish(mut self, started: Instant) -> Self {
        self.duration = started.elapsed();
        self.phase = if self.errors.is_empty() {
            HostPhase::Done
        } else {
            HostPhase::Failed
        };
        self
    }
}

/// Outcome of rolling one tag out to one target
#[derive(Debug, Clone)]
pub struct RolloutReport {
    /// Environment name
    pub environment: String,
    /// Deployed tag
    pub tag: String,
    /// One report per host, in configured host order
    pub hosts: Vec<HostReport>,
}

impl RolloutReport {
    /// Hosts that did not reach [`HostPhase::Done`]
    pub fn failed(&self) -> usize {
        self.hosts.iter().filter(|h| !h.succeeded()).count()
    }

    /// `Err(HostsFailed)` when any host failed
    pub fn into_result(self) -> Result<Self> {
        let failed = self.failed();
        if failed > 0 {
            return Err(RolloutError::HostsFailed {
                failed,
                total: self.hosts.len(),
            }
            .into());
        }
        Ok(self)
    }
}

/// Everything one host sequence needs
pub struct HostSequence<'a, S> {
    /// Remote command runner
    pub shell: &'a S,
    /// Resolved target
    pub plan: &'a TargetPlan,
    /// Command switching the buildout working copy to the tag
    pub switch_command: &'a str,
    /// Tag being deployed
    pub tag: &'a str,
    /// Timeouts
    pub limits: &'a RolloutConfig,
}

impl<S: RemoteShell> HostSequence<'_, S> {
    fn supervisor(&self, action: &str) -> String {
        format!("supervisorctl {} {}", action, self.plan.processes.join(" "))
    }

    /// Run a command, folding transport errors and non-zero exits into `on_failure`
    async fn step(
        &self,
        host: &str,
        command: &str,
        cwd: Option<&str>,
        timeout: Duration,
        on_failure: impl FnOnce(String) -> RolloutError,
    ) -> std::result::Result<CommandOutput, RolloutError> {
        match self.shell.run(host, command, cwd, timeout).await {
            Ok(output) if output.success => Ok(output),
            Ok(output) => Err(on_failure(output.failure_reason())),
            Err(ReleaseError::Rollout(e)) => Err(e),
            Err(e) => Err(on_failure(e.to_string())),
        }
    }

    /// Walk one host through the whole sequence
    pub async fn run_host(&self, host: &str) -> HostReport {
        let started = Instant::now();
        let mut report = HostReport::new(host);
        let dir = self.plan.buildout_dir.as_str();
        let short = self.limits.command_timeout();

        report.phase = HostPhase::Resolving;
        let check = format!("test -d {}", crate::process::shell_quote(dir));
        if let Err(e) = self
            .step(host, &check, None, short, |_| RolloutError::ProvisionMissing {
                host: host.to_string(),
                path: dir.to_string(),
            })
            .await
        {
            report.fail(e);
            return report.finish(started);
        }

        report.phase = HostPhase::Stopping;
        let stop = self.supervisor("stop");
        if let Err(e) = self
            .step(host, &stop, None, short, |reason| {
                RolloutError::SupervisorCommandFailure {
                    host: host.to_string(),
                    command: stop.clone(),
                    reason,
                }
            })
            .await
        {
            report.fail(e);
            return report.finish(started);
        }

        report.phase = HostPhase::Switching;
        let switched = self
            .step(host, self.switch_command, Some(dir), short, |reason| {
                RolloutError::SwitchFailure {
                    host: host.to_string(),
                    tag: self.tag.to_string(),
                    reason,
                }
            })
            .await;

        match switched {
            Ok(_) => {
                report.phase = HostPhase::Building;
                let build = self.plan.build_command.as_str();
                if let Err(e) = self
                    .step(host, build, Some(dir), self.limits.build_timeout(), |reason| {
                        RolloutError::BuildFailure {
                            host: host.to_string(),
                            command: build.to_string(),
                            reason,
                        }
                    })
                    .await
                {
                    report.fail(e);
                }
            }
            Err(e) => report.fail(e),
        }

        report.phase = HostPhase::Starting;
        let start = self.supervisor("start");
        if let Err(e) = self
            .step(host, &start, None, short, |reason| {
                RolloutError::SupervisorCommandFailure {
                    host: host.to_string(),
                    command: start.clone(),
                    reason,
                }
            })
            .await
        {
            report.fail(e);
        }

        report.finish(started)
    }

    /// Run every host of the plan, one after another or all at once
    pub async fn run_all(&self, parallel: bool) -> Vec<HostReport> {
        if parallel {
            join_all(self.plan.hosts.iter().map(|host| self.run_host(host))).await
        } else {
            let mut reports = Vec::with_capacity(self.plan.hosts.len());
            for host in &self.plan.hosts {
                reports.push(self.run_host(host).await);
            }
            reports
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvironmentConfig;
    use crate::testing::FakeShell;

    fn plan(hosts: &[&str]) -> TargetPlan {
        EnvironmentConfig {
            hosts: hosts.iter().map(|h| h.to_string()).collect(),
            base_path: "/var/db/zope".into(),
            buildout_name: "acme".into(),
            supervisor_processes: vec!["instance1 instance2".into()],
            ..EnvironmentConfig::default()
        }
        .resolve("qa")
        .unwrap()
    }

    fn sequence<'a>(shell: &'a FakeShell, plan: &'a TargetPlan, limits: &'a RolloutConfig) -> HostSequence<'a, FakeShell> {
        HostSequence {
            shell,
            plan,
            switch_command: "vcs switch 2.4",
            tag: "2.4",
            limits,
        }
    }

    #[tokio::test]
    async fn runs_steps_in_order() {
        let shell = FakeShell::default();
        let plan = plan(&["web01"]);
        let limits = RolloutConfig::default();

        let report = sequence(&shell, &plan, &limits).run_host("web01").await;

        assert!(report.succeeded());
        assert_eq!(
            shell.commands_on("web01"),
            vec![
                "test -d /var/db/zope/acme",
                "supervisorctl stop instance1 instance2",
                "vcs switch 2.4",
                "bin/buildout -v",
                "supervisorctl start instance1 instance2",
            ]
        );
        let calls = shell.calls();
        assert_eq!(calls[2].cwd.as_deref(), Some("/var/db/zope/acme"));
        assert_eq!(calls[1].cwd, None);
    }

    #[tokio::test]
    async fn missing_buildout_stops_before_supervisor() {
        let shell = FakeShell::default();
        shell.on("web01", "test -d", Ok(CommandOutput::failed(1, "")));
        let plan = plan(&["web01"]);
        let limits = RolloutConfig::default();

        let report = sequence(&shell, &plan, &limits).run_host("web01").await;

        assert_eq!(report.phase, HostPhase::Failed);
        assert_eq!(report.failed_in, Some(HostPhase::Resolving));
        assert!(matches!(report.errors[0], RolloutError::ProvisionMissing { .. }));
        assert_eq!(shell.commands_on("web01").len(), 1);
    }

    #[tokio::test]
    async fn failed_stop_is_fatal_for_the_host() {
        let shell = FakeShell::default();
        shell.on("*", "supervisorctl stop", Ok(CommandOutput::failed(2, "refused")));
        let plan = plan(&["web01"]);
        let limits = RolloutConfig::default();

        let report = sequence(&shell, &plan, &limits).run_host("web01").await;

        assert_eq!(report.failed_in, Some(HostPhase::Stopping));
        assert!(!shell.commands_on("web01").iter().any(|c| c.contains("start")));
    }

    #[tokio::test]
    async fn failed_switch_skips_build_but_restarts() {
        let shell = FakeShell::default();
        shell.on("web01", "vcs switch", Ok(CommandOutput::failed(1, "conflict")));
        let plan = plan(&["web01"]);
        let limits = RolloutConfig::default();

        let report = sequence(&shell, &plan, &limits).run_host("web01").await;

        assert_eq!(report.failed_in, Some(HostPhase::Switching));
        assert!(matches!(report.errors[0], RolloutError::SwitchFailure { .. }));
        let commands = shell.commands_on("web01");
        assert!(!commands.iter().any(|c| c.contains("buildout")));
        assert_eq!(commands.last().unwrap(), "supervisorctl start instance1 instance2");
    }

    #[tokio::test]
    async fn failed_build_still_restarts() {
        let shell = FakeShell::default();
        shell.on(
            "web01",
            "bin/buildout",
            Err(RolloutError::Timeout {
                host: "web01".into(),
                command: "bin/buildout -v".into(),
                seconds: 3600,
            }
            .into()),
        );
        let plan = plan(&["web01"]);
        let limits = RolloutConfig::default();

        let report = sequence(&shell, &plan, &limits).run_host("web01").await;

        assert_eq!(report.failed_in, Some(HostPhase::Building));
        assert!(matches!(report.errors[0], RolloutError::Timeout { .. }));
        assert!(shell.commands_on("web01").last().unwrap().starts_with("supervisorctl start"));
    }

    #[tokio::test]
    async fn hosts_are_independent() {
        let shell = FakeShell::default();
        shell.on(
            "web02",
            "test -d",
            Err(RolloutError::HostUnreachable {
                host: "web02".into(),
                reason: "no route".into(),
            }
            .into()),
        );
        let plan = plan(&["web01", "web02", "web03"]);
        let limits = RolloutConfig::default();

        for parallel in [false, true] {
            let reports = sequence(&shell, &plan, &limits).run_all(parallel).await;
            let outcome: Vec<_> = reports.iter().map(|r| (r.host.as_str(), r.succeeded())).collect();
            assert_eq!(outcome, vec![("web01", true), ("web02", false), ("web03", true)]);

            let report = RolloutReport {
                environment: "qa".into(),
                tag: "2.4".into(),
                hosts: reports,
            };
            assert!(matches!(
                report.into_result(),
                Err(ReleaseError::Rollout(RolloutError::HostsFailed { failed: 1, total: 3 }))
            ));
        }
    }
}
