//! Error types for release and rollout operations.
//!
//! This module defines all error types with actionable error messages and recovery suggestions.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for release_rollout operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Exit code for successful runs
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failures without a more specific class
pub const EXIT_FAILURE: i32 = 1;
/// Exit code when the operator aborted the run
pub const EXIT_ABORTED: i32 = 2;
/// Exit code for missing or invalid configuration
pub const EXIT_CONFIG: i32 = 3;
/// Exit code when the build/publish tool failed
pub const EXIT_RELEASE_TOOL: i32 = 4;
/// Exit code when rollout failed on one or more hosts
pub const EXIT_ROLLOUT: i32 = 5;

/// Main error type for all release_rollout operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Package discovery errors
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Version control errors
    #[error("VCS error: {0}")]
    Vcs(#[from] VcsError),

    /// Version arithmetic and version file errors
    #[error("Version error: {0}")]
    Version(#[from] VersionError),

    /// Build/publish errors
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// State management errors
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Remote rollout errors
    #[error("Rollout error: {0}")]
    Rollout(#[from] RolloutError),

    /// CLI and local command errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// The operator declined to continue
    #[error("Aborted: {reason}")]
    Aborted {
        /// What the operator declined
        reason: String,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Configuration errors, raised before any package or host is touched
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file missing
    #[error("Configuration file not found at {path}")]
    NotFound {
        /// Expected location
        path: PathBuf,
    },

    /// Configuration file could not be parsed
    #[error("Failed to parse {path}: {reason}")]
    Parse {
        /// Configuration file
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// A required value is missing or empty
    #[error("Missing required setting '{key}'")]
    MissingValue {
        /// Setting name
        key: String,
    },

    /// A value is present but unusable
    #[error("Invalid setting '{key}': {reason}")]
    InvalidValue {
        /// Setting name
        key: String,
        /// Reason for the error
        reason: String,
    },

    /// Unknown deployment target
    #[error("Unknown environment '{name}' (known: {known:?})")]
    UnknownEnvironment {
        /// Requested environment
        name: String,
        /// Configured environments
        known: Vec<String>,
    },
}

/// Package discovery errors
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Configured package directory is unreadable
    #[error("Cannot read package directory {path}: {reason}")]
    UnreadableDirectory {
        /// Directory path
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Two working copies resolve to the same canonical name
    #[error(
        "Package name '{name}' is declared by both {first} and {second}. Set allow_name_collisions = true to let the later one win."
    )]
    NameCollision {
        /// Canonical name
        name: String,
        /// Earlier working copy
        first: PathBuf,
        /// Later working copy
        second: PathBuf,
    },

    /// Package name or version could not be resolved
    #[error("Could not resolve package at {path}: {reason}")]
    Unresolvable {
        /// Working copy
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },
}

/// Version control errors
#[derive(Error, Debug)]
pub enum VcsError {
    /// No supported working copy metadata found
    #[error("{path} is not a Subversion, Mercurial or Git working copy")]
    NotWorkingCopy {
        /// Inspected path
        path: PathBuf,
    },

    /// Backend executable not installed
    #[error("'{program}' is required but was not found in PATH")]
    ToolMissing {
        /// Executable name
        program: String,
    },

    /// A VCS command failed
    #[error("'{command}' failed: {reason}")]
    CommandFailed {
        /// Command line
        command: String,
        /// Reason for the error
        reason: String,
    },

    /// Repository layout could not be interpreted
    #[error("Unexpected repository layout for {url}: {reason}")]
    Layout {
        /// Repository URL
        url: String,
        /// Reason for the error
        reason: String,
    },
}

/// Version arithmetic and version file errors
#[derive(Error, Debug)]
pub enum VersionError {
    /// Final version component is not an integer counter
    #[error("Invalid version format '{version}': {reason}")]
    InvalidVersionFormat {
        /// Version string
        version: String,
        /// Reason for the error
        reason: String,
    },

    /// Version pattern is unusable
    #[error("Invalid version pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Regex source
        pattern: String,
        /// Reason for the error
        reason: String,
    },

    /// Version file could not be rewritten
    #[error("Failed to update version file {path}: {reason}")]
    FileUpdateFailed {
        /// Version file
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// Current version went backwards relative to the last release
    #[error("Package '{package}' is at {current}, older than its last release {released}")]
    Regression {
        /// Package name
        package: String,
        /// Version found in the working copy
        current: String,
        /// Version released earlier
        released: String,
    },
}

/// Build/publish errors
#[derive(Error, Debug)]
pub enum PublishError {
    /// Package already released at its current version
    #[error("Package '{package}' version '{version}' has already been released")]
    AlreadyReleased {
        /// Package name
        package: String,
        /// Version string
        version: String,
    },

    /// Release tool failed or produced unusable output
    #[error("Release tool failed for '{package}' ({command}): {reason}")]
    ReleaseToolFailure {
        /// Package name
        package: String,
        /// Command line that ran
        command: String,
        /// Reason for the error
        reason: String,
    },

    /// Package listed for release but unknown to the state
    #[error("Package '{package}' is selected for release but was never discovered")]
    UnknownPackage {
        /// Package name
        package: String,
    },
}

/// State management errors
#[derive(Error, Debug)]
pub enum StateError {
    /// State file corrupted
    #[error("State file corrupted: {reason}")]
    Corrupted {
        /// Reason for the error
        reason: String,
    },

    /// State file not found
    #[error("State file not found. No release in progress.")]
    NotFound,

    /// State version mismatch
    #[error("State file version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected version
        expected: String,
        /// Found version
        found: String,
    },

    /// Failed to save state
    #[error("Failed to save state: {reason}")]
    SaveFailed {
        /// Reason for the error
        reason: String,
    },

    /// Failed to load state
    #[error("Failed to load state: {reason}")]
    LoadFailed {
        /// Reason for the error
        reason: String,
    },
}

/// Remote rollout errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RolloutError {
    /// Target could not be resolved
    #[error("Environment '{environment}' is not deployable: {reason}")]
    Configuration {
        /// Environment name
        environment: String,
        /// Reason for the error
        reason: String,
    },

    /// Host did not answer
    #[error("Host {host} is unreachable: {reason}")]
    HostUnreachable {
        /// Host name
        host: String,
        /// Reason for the error
        reason: String,
    },

    /// Supervisor stop/start failed
    #[error("Supervisor command '{command}' failed on {host}: {reason}")]
    SupervisorCommandFailure {
        /// Host name
        host: String,
        /// Command line
        command: String,
        /// Reason for the error
        reason: String,
    },

    /// Buildout directory absent on the host
    #[error("{path} does not exist on {host}; the environment must be provisioned first")]
    ProvisionMissing {
        /// Host name
        host: String,
        /// Expected buildout directory
        path: String,
    },

    /// Working copy could not be switched to the tag
    #[error("Switching to tag {tag} failed on {host}: {reason}")]
    SwitchFailure {
        /// Host name
        host: String,
        /// Tag being deployed
        tag: String,
        /// Reason for the error
        reason: String,
    },

    /// Build command failed on the host
    #[error("Build '{command}' failed on {host}: {reason}")]
    BuildFailure {
        /// Host name
        host: String,
        /// Command line
        command: String,
        /// Reason for the error
        reason: String,
    },

    /// Remote command exceeded its time budget
    #[error("'{command}' on {host} timed out after {seconds}s")]
    Timeout {
        /// Host name
        host: String,
        /// Command line
        command: String,
        /// Timeout in seconds
        seconds: u64,
    },

    /// Aggregate failure over a target
    #[error("Rollout failed on {failed} of {total} host(s)")]
    HostsFailed {
        /// Hosts that failed
        failed: usize,
        /// Hosts attempted
        total: usize,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Command execution failed
    #[error("Command execution failed: {command} - {reason}")]
    ExecutionFailed {
        /// Command that failed
        command: String,
        /// Reason for the error
        reason: String,
    },

    /// Local command exceeded its time budget
    #[error("Command '{command}' timed out after {seconds}s")]
    Timeout {
        /// Command that timed out
        command: String,
        /// Timeout in seconds
        seconds: u64,
    },
}

impl ReleaseError {
    /// Operator declined a confirmation
    pub fn aborted(reason: impl Into<String>) -> Self {
        ReleaseError::Aborted {
            reason: reason.into(),
        }
    }

    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ReleaseError::Config(ConfigError::NotFound { path }) => vec![
                format!("Create {} in the umbrella project root", path.display()),
                "Or point --config / RELEASE_ROLLOUT_CONFIG at an existing file".to_string(),
            ],
            ReleaseError::Discovery(DiscoveryError::NameCollision { first, second, .. }) => vec![
                format!(
                    "Add one of {} or {} to ignore_dirs",
                    first.display(),
                    second.display()
                ),
                "Or set allow_name_collisions = true to keep the later package".to_string(),
            ],
            ReleaseError::Publish(PublishError::ReleaseToolFailure { package, .. }) => vec![
                format!("Inspect the release tool output for '{}'", package),
                "Packages released before the failure are recorded; rerun `release` to continue"
                    .to_string(),
            ],
            ReleaseError::State(StateError::VersionMismatch { .. })
            | ReleaseError::State(StateError::Corrupted { .. }) => vec![
                "Run `abandon` to discard the saved state and start a fresh selection".to_string(),
            ],
            ReleaseError::State(StateError::NotFound) => vec![
                "Run `select` first, or `deploy` for the whole cycle".to_string(),
            ],
            ReleaseError::Rollout(RolloutError::ProvisionMissing { host, path }) => vec![
                format!("Check out the buildout at {} on {} before deploying", path, host),
            ],
            ReleaseError::Rollout(RolloutError::HostsFailed { .. }) => vec![
                "Review the per-host report above".to_string(),
                "Rerun `rollout <target> --tag <tag>` once the hosts are fixed".to_string(),
            ],
            ReleaseError::Vcs(VcsError::ToolMissing { program }) => {
                vec![format!("Install {} and make sure it is on PATH", program)]
            }
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReleaseError::Publish(PublishError::AlreadyReleased { .. })
        )
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ReleaseError::Aborted { .. } => EXIT_ABORTED,
            ReleaseError::Config(_) => EXIT_CONFIG,
            ReleaseError::Rollout(RolloutError::Configuration { .. }) => EXIT_CONFIG,
            ReleaseError::Publish(PublishError::ReleaseToolFailure { .. }) => EXIT_RELEASE_TOOL,
            ReleaseError::Rollout(_) => EXIT_ROLLOUT,
            _ => EXIT_FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_distinguish_failure_classes() {
        assert_eq!(ReleaseError::aborted("no").exit_code(), EXIT_ABORTED);
        assert_eq!(
            ReleaseError::from(ConfigError::MissingValue {
                key: "pins_file".into()
            })
            .exit_code(),
            EXIT_CONFIG
        );
        assert_eq!(
            ReleaseError::from(PublishError::ReleaseToolFailure {
                package: "a".into(),
                command: "mkrelease".into(),
                reason: "boom".into(),
            })
            .exit_code(),
            EXIT_RELEASE_TOOL
        );
        assert_eq!(
            ReleaseError::from(RolloutError::HostsFailed { failed: 1, total: 3 }).exit_code(),
            EXIT_ROLLOUT
        );
        assert_eq!(ReleaseError::from(StateError::NotFound).exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn only_already_released_is_recoverable() {
        assert!(
            ReleaseError::from(PublishError::AlreadyReleased {
                package: "a".into(),
                version: "1.0".into(),
            })
            .is_recoverable()
        );
        assert!(!ReleaseError::from(StateError::NotFound).is_recoverable());
    }
}
