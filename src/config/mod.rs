//! Project configuration loaded from `deploy.toml`.
//!
//! The file lives in the umbrella project root. Every table is optional; the
//! defaults describe a buildout project whose packages live under `src/` and
//! declare their version in `setup.py`.

mod environment;

pub use environment::{DataConfig, EnvironmentConfig, RolloutConfig, TargetPlan};

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default configuration file name in the project root
pub const CONFIG_FILE_NAME: &str = "deploy.toml";

/// Environment variable overriding the configuration file location
pub const CONFIG_ENV_VAR: &str = "RELEASE_ROLLOUT_CONFIG";

/// Pattern matching `version = '1.0'` style declarations in setup.py
pub const SETUPPY_VERSION: &str = r#"(version.*=.*['"])(.*)(['"])"#;

/// Complete project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Project name, used in tracker URLs and data snapshot paths
    pub project_name: String,
    /// Release-manager ticket query shown before a deploy (`{project}` is substituted)
    pub tracker_url: Option<String>,
    /// Directories scanned for package working copies, in pipeline order
    pub package_dirs: Vec<PathBuf>,
    /// Entry names skipped during discovery
    pub ignore_dirs: Vec<String>,
    /// Let a later package directory replace an earlier one with the same name
    pub allow_name_collisions: bool,
    /// Release target passed to the release tool unless overridden per package
    pub default_release_target: String,
    /// Where packages declare their version
    pub version_location: VersionLocation,
    /// Version pins file, relative to the project root
    pub pins_file: PathBuf,
    /// Umbrella version marker file, relative to the project root
    pub umbrella_version_file: PathBuf,
    /// Saved release choices, relative to the project root
    pub state_file: PathBuf,
    /// Per-package overrides keyed by canonical package name
    pub packages: BTreeMap<String, PackageOverride>,
    /// Build/publish tool commands
    pub tool: ToolConfig,
    /// Deployment targets keyed by environment name
    pub environments: BTreeMap<String, EnvironmentConfig>,
    /// Remote command limits
    pub rollout: RolloutConfig,
    /// Data snapshot server
    pub data: DataConfig,
}

/// Version declaration file and the pattern locating the version literal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VersionLocation {
    /// File relative to the package working copy
    pub file: PathBuf,
    /// Regex with three groups: prefix, version literal, suffix
    pub pattern: String,
}

impl Default for VersionLocation {
    fn default() -> Self {
        Self {
            file: PathBuf::from("setup.py"),
            pattern: SETUPPY_VERSION.to_string(),
        }
    }
}

/// Per-package settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageOverride {
    /// Release target for this package
    pub target: Option<String>,
    /// Version declaration file, relative to the package
    pub version_file: Option<PathBuf>,
    /// Version pattern for `version_file`
    pub version_pattern: Option<String>,
}

/// Commands run by the build/publish tool adapter
///
/// `{path}`, `{target}` and `{name}` placeholders are substituted before the
/// command line is handed to `sh -c`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Prints the declared package name, run inside the working copy
    pub name_command: String,
    /// Prints the declared package version, run inside the working copy
    pub version_command: String,
    /// Builds, tags and uploads a release
    pub release_command: String,
    /// Regex locating the released version in the release command output
    pub tagged_pattern: String,
    /// Time budget for each tool invocation, in seconds
    pub timeout_secs: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            name_command: "python setup.py --name".to_string(),
            version_command: "python setup.py --version".to_string(),
            release_command: "mkrelease -C -d {target} {path}".to_string(),
            tagged_pattern: "Tagging {name} (.*)".to_string(),
            timeout_secs: 1800,
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            project_name: String::new(),
            tracker_url: None,
            package_dirs: vec![PathBuf::from("src")],
            ignore_dirs: Vec::new(),
            allow_name_collisions: false,
            default_release_target: "public".to_string(),
            version_location: VersionLocation::default(),
            pins_file: PathBuf::from("profiles/versions.cfg"),
            umbrella_version_file: PathBuf::from("version.txt"),
            state_file: PathBuf::from(".saved_choices.json"),
            packages: BTreeMap::new(),
            tool: ToolConfig::default(),
            environments: BTreeMap::new(),
            rollout: RolloutConfig::default(),
            data: DataConfig::default(),
        }
    }
}

impl ProjectConfig {
    /// Locate and load the configuration for `project_dir`
    ///
    /// An explicit path wins, then `RELEASE_ROLLOUT_CONFIG`, then
    /// `<project_dir>/deploy.toml`.
    pub fn load(project_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => std::env::var_os(CONFIG_ENV_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| project_dir.join(CONFIG_FILE_NAME)),
        };
        if !path.exists() {
            return Err(ConfigError::NotFound { path }.into());
        }

        let content = std::fs::read_to_string(&path)?;
        let mut config = Self::from_toml_str(&content).map_err(|reason| ConfigError::Parse {
            path: path.clone(),
            reason,
        })?;
        config.rollout.apply_env_overrides();
        config.validate()?;
        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration text
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Pre-flight checks that must pass before any package or host is touched
    pub fn validate(&self) -> Result<()> {
        if self.package_dirs.is_empty() {
            return Err(ConfigError::MissingValue {
                key: "package_dirs".to_string(),
            }
            .into());
        }
        if self.default_release_target.trim().is_empty() {
            return Err(ConfigError::MissingValue {
                key: "default_release_target".to_string(),
            }
            .into());
        }
        check_version_pattern("version_location.pattern", &self.version_location.pattern)?;
        for (name, package) in &self.packages {
            if let Some(pattern) = &package.version_pattern {
                check_version_pattern(&format!("packages.{}.version_pattern", name), pattern)?;
            }
        }
        if !self.tool.tagged_pattern.contains("(") {
            return Err(ConfigError::InvalidValue {
                key: "tool.tagged_pattern".to_string(),
                reason: "must contain a capture group for the version".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Release target for `package`
    pub fn release_target(&self, package: &str) -> &str {
        self.packages
            .get(package)
            .and_then(|p| p.target.as_deref())
            .unwrap_or(&self.default_release_target)
    }

    /// Version file (relative to the package) and pattern for `package`
    pub fn version_location(&self, package: &str) -> (PathBuf, String) {
        let overrides = self.packages.get(package);
        let file = overrides
            .and_then(|p| p.version_file.clone())
            .unwrap_or_else(|| self.version_location.file.clone());
        let pattern = overrides
            .and_then(|p| p.version_pattern.clone())
            .unwrap_or_else(|| self.version_location.pattern.clone());
        (file, pattern)
    }

    /// Resolve a deployment target by name
    pub fn environment(&self, name: &str) -> Result<&EnvironmentConfig> {
        self.environments.get(name).ok_or_else(|| {
            ConfigError::UnknownEnvironment {
                name: name.to_string(),
                known: self.environments.keys().cloned().collect(),
            }
            .into()
        })
    }

    /// Tracker URL with the project name filled in
    pub fn tracker_link(&self) -> Option<String> {
        self.tracker_url
            .as_ref()
            .map(|url| url.replace("{project}", &self.project_name))
    }
}

fn check_version_pattern(key: &str, pattern: &str) -> Result<()> {
    let regex = regex::Regex::new(pattern).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    // group 0 is the whole match
    if regex.captures_len() < 4 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: "needs three capture groups: prefix, version, suffix".to_string(),
        }
        .into());
    }
    Ok(())
}
