//! Release state tracking and serialization.

use crate::error::{Result, StateError, VersionError};
use crate::version::{compare_versions, next_minor_version};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Current version of the state format
pub const STATE_FORMAT_VERSION: u32 = 1;

/// One discovered package and what happened to it during this cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Canonical package name
    pub name: String,
    /// Working copy on disk
    pub path: PathBuf,
    /// Version declared by the working copy when discovered
    pub current_version: String,
    /// Operator chose to release this package
    #[serde(default)]
    pub selected_for_release: bool,
    /// Version published by the release tool
    #[serde(default)]
    pub released_version: Option<String>,
    /// Version written back after the release
    #[serde(default)]
    pub next_version: Option<String>,
    /// Release target handed to the release tool
    pub target: String,
    /// Version declaration file, relative to `path`
    pub version_file: PathBuf,
    /// Regex locating the version literal in `version_file`
    pub version_pattern: String,
}

impl PackageRecord {
    /// Fresh record for a discovered working copy
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            current_version: version.into(),
            selected_for_release: false,
            released_version: None,
            next_version: None,
            target: "public".to_string(),
            version_file: PathBuf::from("setup.py"),
            version_pattern: crate::config::SETUPPY_VERSION.to_string(),
        }
    }
}

/// Stage of the release cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReleasePhase {
    /// Packages discovered, nothing chosen yet
    Discovery,
    /// Operator answered for every package
    Selection,
    /// Selected packages built and published
    Release,
    /// Version files bumped and committed
    VersionBump,
    /// Pins file rewritten and committed
    PinsUpdate,
    /// Umbrella configuration tagged
    UmbrellaTag,
    /// Tag rolled out to the target
    Rollout,
    /// Cycle finished
    Completed,
}

impl std::fmt::Display for ReleasePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReleasePhase::Discovery => write!(f, "Discovery"),
            ReleasePhase::Selection => write!(f, "Selection"),
            ReleasePhase::Release => write!(f, "Release"),
            ReleasePhase::VersionBump => write!(f, "Version bump"),
            ReleasePhase::PinsUpdate => write!(f, "Pins update"),
            ReleasePhase::UmbrellaTag => write!(f, "Umbrella tag"),
            ReleasePhase::Rollout => write!(f, "Rollout"),
            ReleasePhase::Completed => write!(f, "Completed"),
        }
    }
}

/// Checkpoint reached during the cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseCheckpoint {
    /// Checkpoint name
    pub name: String,
    /// Phase this checkpoint completes
    pub phase: ReleasePhase,
    /// Timestamp when checkpoint was reached
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Persisted record of one release cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseState {
    /// Version of the state format
    pub format_version: u32,
    /// Number of changes recorded since the cycle started
    pub save_version: u64,
    /// Unique ID for this cycle
    pub release_id: String,
    /// Timestamp when the cycle started
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// Timestamp when the state was last updated
    pub updated_at: chrono::DateTime<chrono::Utc>,
    /// Latest phase entered
    pub current_phase: ReleasePhase,
    /// Packages keyed by canonical name
    pub packages: BTreeMap<String, PackageRecord>,
    /// Package names in discovery order
    pub discovery_order: Vec<String>,
    /// Selected package names in discovery order
    pub to_release: Vec<String>,
    /// Umbrella tag produced by this cycle
    pub deploy_tag: Option<String>,
    /// Phases completed so far
    pub checkpoints: Vec<ReleaseCheckpoint>,
}

impl Default for ReleaseState {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseState {
    /// Empty state for a new cycle
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        Self {
            format_version: STATE_FORMAT_VERSION,
            save_version: 0,
            release_id: format!("release-{}", now.timestamp()),
            started_at: now,
            updated_at: now,
            current_phase: ReleasePhase::Discovery,
            packages: BTreeMap::new(),
            discovery_order: Vec::new(),
            to_release: Vec::new(),
            deploy_tag: None,
            checkpoints: Vec::new(),
        }
    }

    /// State seeded with discovered packages, in discovery order
    pub fn from_discovery(records: Vec<PackageRecord>) -> Self {
        let mut state = Self::new();
        for record in records {
            if !state.packages.contains_key(&record.name) {
                state.discovery_order.push(record.name.clone());
            }
            state.packages.insert(record.name.clone(), record);
        }
        state
    }

    /// Packages in discovery order
    pub fn ordered(&self) -> impl Iterator<Item = &PackageRecord> {
        self.discovery_order
            .iter()
            .filter_map(|name| self.packages.get(name))
    }

    /// Record the operator's answer for `name`
    pub fn set_selected(&mut self, name: &str, selected: bool) {
        if let Some(record) = self.packages.get_mut(name) {
            record.selected_for_release = selected;
        }
        self.to_release = self
            .ordered()
            .filter(|r| r.selected_for_release)
            .map(|r| r.name.clone())
            .collect();
        self.touch();
    }

    /// Record a published version and compute the next development version
    ///
    /// Refuses versions older than an earlier release of the same package.
    pub fn record_release(&mut self, name: &str, version: &str) -> Result<()> {
        let record = self
            .packages
            .get_mut(name)
            .ok_or_else(|| crate::error::PublishError::UnknownPackage {
                package: name.to_string(),
            })?;
        if let Some(previous) = &record.released_version
            && compare_versions(version, previous) == Ordering::Less
        {
            return Err(VersionError::Regression {
                package: name.to_string(),
                current: version.to_string(),
                released: previous.clone(),
            }
            .into());
        }
        record.next_version = Some(next_minor_version(version)?);
        record.released_version = Some(version.to_string());
        self.touch();
        Ok(())
    }

    /// Record the umbrella tag created this cycle
    pub fn record_deploy_tag(&mut self, tag: &str) {
        self.deploy_tag = Some(tag.to_string());
        self.touch();
    }

    /// Selected packages that have been published, in release order
    pub fn released(&self) -> Vec<&PackageRecord> {
        self.to_release
            .iter()
            .filter_map(|name| self.packages.get(name))
            .filter(|r| r.released_version.is_some())
            .collect()
    }

    /// Add a checkpoint completing `phase`
    pub fn add_checkpoint(&mut self, name: impl Into<String>, phase: ReleasePhase) {
        self.checkpoints.push(ReleaseCheckpoint {
            name: name.into(),
            phase,
            timestamp: chrono::Utc::now(),
        });
        self.current_phase = self.current_phase.max(phase);
        self.touch();
    }

    fn touch(&mut self) {
        self.save_version += 1;
        self.updated_at = chrono::Utc::now();
    }

    /// Check if a specific phase has been completed
    pub fn has_completed(&self, phase: ReleasePhase) -> bool {
        self.checkpoints.iter().any(|cp| cp.phase == phase)
    }

    /// Get elapsed time
    pub fn elapsed_time(&self) -> chrono::Duration {
        self.updated_at - self.started_at
    }

    /// Validate state consistency
    pub fn validate(&self) -> Result<()> {
        if self.format_version != STATE_FORMAT_VERSION {
            return Err(StateError::VersionMismatch {
                expected: STATE_FORMAT_VERSION.to_string(),
                found: self.format_version.to_string(),
            }
            .into());
        }
        if let Some(missing) = self
            .to_release
            .iter()
            .find(|name| !self.packages.contains_key(*name))
        {
            return Err(StateError::Corrupted {
                reason: format!("'{}' is selected but has no package record", missing),
            }
            .into());
        }
        Ok(())
    }

    /// Create a summary of the release state
    pub fn summary(&self) -> String {
        format!(
            "{} ({}) - {} package(s), {} selected, {} released - {} elapsed",
            self.release_id,
            self.current_phase,
            self.packages.len(),
            self.to_release.len(),
            self.released().len(),
            format_duration(self.elapsed_time())
        )
    }
}

fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReleaseError;

    fn state() -> ReleaseState {
        ReleaseState::from_discovery(vec![
            PackageRecord::new("acme.theme", "src/acme.theme", "1.0"),
            PackageRecord::new("acme.policy", "src/acme.policy", "2.3"),
            PackageRecord::new("acme.content", "src/acme.content", "0.9"),
        ])
    }

    #[test]
    fn selection_keeps_discovery_order() {
        let mut state = state();
        state.set_selected("acme.content", true);
        state.set_selected("acme.theme", true);
        assert_eq!(state.to_release, vec!["acme.theme", "acme.content"]);

        state.set_selected("acme.theme", false);
        assert_eq!(state.to_release, vec!["acme.content"]);
    }

    #[test]
    fn record_release_computes_next_version() {
        let mut state = state();
        state.set_selected("acme.policy", true);
        state.record_release("acme.policy", "2.9").unwrap();
        let record = &state.packages["acme.policy"];
        assert_eq!(record.released_version.as_deref(), Some("2.9"));
        assert_eq!(record.next_version.as_deref(), Some("2.10"));
        assert_eq!(state.released().len(), 1);
    }

    #[test]
    fn record_release_refuses_regression() {
        let mut state = state();
        state.record_release("acme.theme", "1.4").unwrap();
        assert!(matches!(
            state.record_release("acme.theme", "1.3"),
            Err(ReleaseError::Version(VersionError::Regression { .. }))
        ));
        // same version again is allowed and changes nothing
        state.record_release("acme.theme", "1.4").unwrap();
        assert_eq!(state.packages["acme.theme"].released_version.as_deref(), Some("1.4"));
    }

    #[test]
    fn checkpoints_advance_phase() {
        let mut state = state();
        state.add_checkpoint("selected", ReleasePhase::Selection);
        state.add_checkpoint("released", ReleasePhase::Release);
        assert!(state.has_completed(ReleasePhase::Selection));
        assert!(!state.has_completed(ReleasePhase::VersionBump));
        assert_eq!(state.current_phase, ReleasePhase::Release);
    }

    #[test]
    fn validate_rejects_other_format_versions() {
        let mut state = state();
        state.format_version = STATE_FORMAT_VERSION + 1;
        assert!(matches!(
            state.validate(),
            Err(ReleaseError::State(StateError::VersionMismatch { .. }))
        ));
    }
}
