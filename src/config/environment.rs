//! Deployment target, rollout limit and data server settings.

use crate::error::RolloutError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One deployment environment (testing, staging, prod, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    /// Hosts receiving the rollout, in order
    pub hosts: Vec<String>,
    /// Directory containing the buildout on every host
    pub base_path: String,
    /// Buildout directory name under `base_path`
    pub buildout_name: String,
    /// Supervisor program names to stop and start
    pub supervisor_processes: Vec<String>,
    /// Build command run inside the buildout directory
    pub build_command: String,
    /// Ask "Are you sure?" before touching any host
    pub confirm: bool,
    /// `deploy` only rolls out an existing tag for this environment
    pub promote_only: bool,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            base_path: String::new(),
            buildout_name: String::new(),
            supervisor_processes: Vec::new(),
            build_command: "bin/buildout -v".to_string(),
            confirm: false,
            promote_only: false,
        }
    }
}

/// Fully resolved rollout target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPlan {
    /// Environment name
    pub environment: String,
    /// Hosts to roll out to
    pub hosts: Vec<String>,
    /// Base path on each host
    pub base_path: String,
    /// Absolute buildout directory on each host
    pub buildout_dir: String,
    /// Supervisor programs
    pub processes: Vec<String>,
    /// Build command
    pub build_command: String,
}

impl EnvironmentConfig {
    /// Resolve into a [`TargetPlan`], failing on the first missing value
    pub fn resolve(&self, environment: &str) -> Result<TargetPlan, RolloutError> {
        let missing = |what: &str| RolloutError::Configuration {
            environment: environment.to_string(),
            reason: format!("no {} configured", what),
        };

        let hosts: Vec<String> = self
            .hosts
            .iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();
        if hosts.is_empty() {
            return Err(missing("hosts"));
        }
        let base_path = self.base_path.trim().trim_end_matches('/');
        if base_path.is_empty() {
            return Err(missing("base_path"));
        }
        let buildout_name = self.buildout_name.trim().trim_matches('/');
        if buildout_name.is_empty() {
            return Err(missing("buildout_name"));
        }
        let processes: Vec<String> = self
            .supervisor_processes
            .iter()
            .flat_map(|p| p.split_whitespace())
            .map(str::to_string)
            .collect();
        if processes.is_empty() {
            return Err(missing("supervisor_processes"));
        }
        if self.build_command.trim().is_empty() {
            return Err(missing("build_command"));
        }

        Ok(TargetPlan {
            environment: environment.to_string(),
            hosts,
            base_path: base_path.to_string(),
            buildout_dir: format!("{}/{}", base_path, buildout_name),
            processes,
            build_command: self.build_command.trim().to_string(),
        })
    }
}

/// Time budgets for remote commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RolloutConfig {
    /// Limit for supervisor, switch and provisioning commands, in seconds
    pub command_timeout_secs: u64,
    /// Limit for the build command, in seconds
    pub build_timeout_secs: u64,
    /// Roll out to all hosts of a target concurrently
    pub parallel: bool,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 300,
            build_timeout_secs: 3600,
            parallel: false,
        }
    }
}

impl RolloutConfig {
    /// Parse a timeout from an environment variable, clamped to `max`
    fn parse_timeout_env(var_name: &str, default: u64, max: u64) -> u64 {
        std::env::var(var_name)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .map(|v| v.min(max))
            .unwrap_or(default)
    }

    /// Apply `RELEASE_ROLLOUT_COMMAND_TIMEOUT` / `RELEASE_ROLLOUT_BUILD_TIMEOUT`
    pub fn apply_env_overrides(&mut self) {
        self.command_timeout_secs = Self::parse_timeout_env(
            "RELEASE_ROLLOUT_COMMAND_TIMEOUT",
            self.command_timeout_secs,
            3600,
        );
        self.build_timeout_secs = Self::parse_timeout_env(
            "RELEASE_ROLLOUT_BUILD_TIMEOUT",
            self.build_timeout_secs,
            6 * 3600,
        );
    }

    /// Limit for short remote commands
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Limit for the remote build
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }
}

/// Data snapshot server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Hosts storing snapshots; the first one is used for syncing
    pub hosts: Vec<String>,
    /// Base directory; snapshots live in `<base_path>/<project>/data`
    pub base_path: String,
    /// Full snapshot directory, overriding `base_path`
    pub full_path: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            base_path: "/usr/local/www/data".to_string(),
            full_path: None,
        }
    }
}
