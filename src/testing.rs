//! In-memory collaborators for unit tests.

use crate::cli::OutputManager;
use crate::config::ProjectConfig;
use crate::context::Context;
use crate::error::{DiscoveryError, ReleaseError, Result, VcsError};
use crate::process::CommandOutput;
use crate::prompt::Prompter;
use crate::rollout::RemoteShell;
use crate::tool::{PackageInfo, PackageTool};
use crate::vcs::VersionControl;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Quiet context rooted at `root`, saving state
pub(crate) fn context(root: &Path, config: ProjectConfig) -> Context {
    Context::new(config, root, OutputManager::new(false, true), true)
}

/// Package tool answering from a table keyed by directory name
#[derive(Default)]
pub(crate) struct FakeTool {
    packages: Mutex<HashMap<String, (String, String)>>,
    outputs: Mutex<HashMap<String, CommandOutput>>,
    pub released: Mutex<Vec<(String, String)>>,
}

impl FakeTool {
    pub(crate) fn with(entries: &[(&str, &str, &str)]) -> Self {
        let tool = Self::default();
        for (dir, name, version) in entries {
            tool.set(dir, name, version);
        }
        tool
    }

    pub(crate) fn set(&self, dir: &str, name: &str, version: &str) {
        self.packages
            .lock()
            .unwrap()
            .insert(dir.to_string(), (name.to_string(), version.to_string()));
    }

    /// Output the release command produces for `name`
    pub(crate) fn script_release(&self, name: &str, output: CommandOutput) {
        self.outputs.lock().unwrap().insert(name.to_string(), output);
    }

    pub(crate) fn released(&self) -> Vec<(String, String)> {
        self.released.lock().unwrap().clone()
    }
}

impl PackageTool for FakeTool {
    async fn resolve(&self, path: &Path) -> Result<PackageInfo> {
        let dir = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.packages
            .lock()
            .unwrap()
            .get(&dir)
            .map(|(name, version)| PackageInfo {
                name: name.clone(),
                version: version.clone(),
            })
            .ok_or_else(|| {
                DiscoveryError::Unresolvable {
                    path: path.to_path_buf(),
                    reason: "no setup.py".into(),
                }
                .into()
            })
    }

    async fn release(&self, _path: &Path, name: &str, target: &str) -> Result<CommandOutput> {
        self.released
            .lock()
            .unwrap()
            .push((name.to_string(), target.to_string()));
        Ok(self
            .outputs
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| CommandOutput::failed(1, "no scripted output")))
    }
}

/// Recorded VCS side effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum VcsCall {
    Diff(PathBuf, String),
    Tag(PathBuf, String, String),
    Commit(PathBuf, String),
}

/// Version control keeping tags in memory
#[derive(Default)]
pub(crate) struct FakeVcs {
    pub tags: Mutex<HashMap<PathBuf, Vec<String>>>,
    pub calls: Mutex<Vec<VcsCall>>,
    pub fail_commits: bool,
}

impl FakeVcs {
    pub(crate) fn with_tags(&self, path: &Path, tags: &[&str]) {
        self.tags.lock().unwrap().insert(
            path.to_path_buf(),
            tags.iter().map(|t| t.to_string()).collect(),
        );
    }

    pub(crate) fn calls(&self) -> Vec<VcsCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn commits(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                VcsCall::Commit(path, _) => Some(path),
                _ => None,
            })
            .collect()
    }
}

impl VersionControl for FakeVcs {
    async fn list_tags(&self, path: &Path) -> Result<Vec<String>> {
        Ok(self
            .tags
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default())
    }

    async fn diff_tag(&self, path: &Path, tag: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push(VcsCall::Diff(path.to_path_buf(), tag.to_string()));
        Ok(format!("--- {}\n+++ working copy\n", tag))
    }

    async fn create_tag(&self, path: &Path, tag: &str, message: &str) -> Result<()> {
        self.calls.lock().unwrap().push(VcsCall::Tag(
            path.to_path_buf(),
            tag.to_string(),
            message.to_string(),
        ));
        self.tags
            .lock()
            .unwrap()
            .entry(path.to_path_buf())
            .or_default()
            .push(tag.to_string());
        Ok(())
    }

    async fn commit(&self, file: &Path, message: &str) -> Result<()> {
        if self.fail_commits {
            return Err(VcsError::CommandFailed {
                command: "commit".into(),
                reason: "out of date".into(),
            }
            .into());
        }
        self.calls
            .lock()
            .unwrap()
            .push(VcsCall::Commit(file.to_path_buf(), message.to_string()));
        Ok(())
    }

    async fn switch_command(&self, _path: &Path, tag: &str) -> Result<String> {
        Ok(format!("vcs switch {}", tag))
    }
}

/// One remote invocation seen by [`FakeShell`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ShellCall {
    pub host: String,
    pub command: String,
    pub cwd: Option<String>,
}

/// Remote shell answering by (host, command substring) rules
#[derive(Default)]
pub(crate) struct FakeShell {
    rules: Mutex<Vec<(String, String, Result<CommandOutput>)>>,
    pub calls: Mutex<Vec<ShellCall>>,
    pub fetched: Mutex<Vec<(String, String, PathBuf)>>,
}

impl FakeShell {
    /// Make commands on `host` containing `needle` produce `outcome`;
    /// `*` matches any host
    pub(crate) fn on(&self, host: &str, needle: &str, outcome: Result<CommandOutput>) {
        self.rules
            .lock()
            .unwrap()
            .push((host.to_string(), needle.to_string(), outcome));
    }

    pub(crate) fn calls(&self) -> Vec<ShellCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn commands_on(&self, host: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.host == host)
            .map(|c| c.command)
            .collect()
    }
}

fn clone_outcome(outcome: &Result<CommandOutput>) -> Result<CommandOutput> {
    match outcome {
        Ok(output) => Ok(output.clone()),
        Err(crate::error::ReleaseError::Rollout(e)) => Err(e.clone().into()),
        Err(e) => Err(crate::error::ReleaseError::Anyhow(anyhow::anyhow!("{}", e))),
    }
}

impl RemoteShell for FakeShell {
    async fn run(
        &self,
        host: &str,
        command: &str,
        cwd: Option<&str>,
        _timeout: Duration,
    ) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(ShellCall {
            host: host.to_string(),
            command: command.to_string(),
            cwd: cwd.map(str::to_string),
        });
        let rules = self.rules.lock().unwrap();
        rules
            .iter()
            .rev()
            .find(|(h, needle, _)| (h == "*" || h == host) && command.contains(needle.as_str()))
            .map(|(_, _, outcome)| clone_outcome(outcome))
            .unwrap_or_else(|| Ok(CommandOutput::ok("")))
    }

    async fn fetch(
        &self,
        host: &str,
        remote_path: &str,
        local_path: &Path,
        _timeout: Duration,
    ) -> Result<()> {
        self.fetched.lock().unwrap().push((
            host.to_string(),
            remote_path.to_string(),
            local_path.to_path_buf(),
        ));
        Ok(())
    }
}

/// Replays a fixed list of answers; an empty string selects the default
#[derive(Debug, Default)]
pub(crate) struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    /// Prompter answering with `answers` in order
    pub(crate) fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Questions asked so far
    pub(crate) fn questions(&self) -> Vec<String> {
        self.asked.lock().map(|q| q.clone()).unwrap_or_default()
    }

    /// Answers not yet consumed
    pub(crate) fn remaining(&self) -> usize {
        self.answers.lock().map(|a| a.len()).unwrap_or_default()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&self, question: &str, default: Option<&str>) -> Result<String> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(question.to_string());
        }
        let next = self.answers.lock().ok().and_then(|mut a| a.pop_front());
        match next {
            Some(answer) if answer.trim().is_empty() => Ok(default.unwrap_or_default().to_string()),
            Some(answer) => Ok(answer.trim().to_string()),
            None => Err(ReleaseError::aborted(format!(
                "no scripted answer for '{}'",
                question
            ))),
        }
    }
}
