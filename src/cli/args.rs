//! Command line argument parsing and validation.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Operator-driven release and rollout for buildout projects
#[derive(Parser, Debug)]
#[command(
    name = "release_rollout",
    version,
    about = "Release packages, tag the umbrella buildout and roll it out to hosts",
    long_about = "Walk the package working copies of a buildout project, pick the ones that
need a release, publish them, bump their versions, rewrite the version pins,
tag the buildout and roll the tag out to the hosts of an environment.

Usage:
  release_rollout deploy qa
  release_rollout rollout prod --tag 2.4
  release_rollout data sync prod"
)]
pub struct Args {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Umbrella project directory
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    pub project_dir: PathBuf,

    /// Configuration file (defaults to <project-dir>/deploy.toml)
    #[arg(long, global = true, value_name = "FILE", env = "RELEASE_ROLLOUT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Do not persist choices and progress between runs
    #[arg(long, global = true)]
    pub no_save: bool,

    /// Only print warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print detailed progress
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the whole cycle and roll the result out to an environment
    Deploy {
        /// Environment to roll out to
        target: String,

        /// Skip the diff review while selecting packages
        #[arg(long)]
        no_diff: bool,

        /// Roll out this tag instead of the one created
        #[arg(long, env = "RELEASE_ROLLOUT_TAG")]
        tag: Option<String>,

        /// Update all hosts at once
        #[arg(long)]
        parallel: bool,
    },

    /// List the packages that are available for release
    Discover,

    /// Choose the packages that need a release
    Select {
        /// Skip the diff review
        #[arg(long)]
        no_diff: bool,
    },

    /// Publish the selected packages
    Release,

    /// Write next development versions into released packages
    BumpVersions,

    /// Pin released versions in the pins file
    UpdatePins,

    /// Tag the umbrella buildout and bump its version
    TagUmbrella,

    /// Roll a tag out to an environment
    Rollout {
        /// Environment to roll out to
        target: String,

        /// Tag to roll out (defaults to the tag of this cycle, then asks)
        #[arg(long, env = "RELEASE_ROLLOUT_TAG")]
        tag: Option<String>,

        /// Update all hosts at once
        #[arg(long)]
        parallel: bool,
    },

    /// Show the saved release cycle
    Status {
        /// Show checkpoints and per-package versions
        #[arg(short, long)]
        detailed: bool,

        /// Print the saved state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Discard the saved release cycle
    Abandon {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Work with database snapshots on the data server
    Data {
        /// Snapshot operation
        #[command(subcommand)]
        action: DataAction,
    },
}

/// Snapshot operations
#[derive(Subcommand, Debug, Clone)]
pub enum DataAction {
    /// List saved snapshots
    List {
        /// File name filter
        #[arg(default_value = crate::data::DEFAULT_FILTER)]
        filter: String,
    },

    /// Download a snapshot into the project directory
    Fetch {
        /// Snapshot file (asks when omitted)
        file: Option<String>,
    },

    /// Copy a snapshot to every host of an environment
    Push {
        /// Environment receiving the snapshot
        target: String,

        /// Snapshot file (asks when omitted)
        file: Option<String>,
    },

    /// Snapshot the database of prod or staging
    Sync {
        /// Role to snapshot
        #[arg(default_value = "prod")]
        role: String,
    },
}

impl Command {
    /// Name used in messages
    pub fn name(&self) -> &'static str {
        match self {
            Command::Deploy { .. } => "deploy",
            Command::Discover => "discover",
            Command::Select { .. } => "select",
            Command::Release => "release",
            Command::BumpVersions => "bump-versions",
            Command::UpdatePins => "update-pins",
            Command::TagUmbrella => "tag-umbrella",
            Command::Rollout { .. } => "rollout",
            Command::Status { .. } => "status",
            Command::Abandon { .. } => "abandon",
            Command::Data { .. } => "data",
        }
    }

    /// Whether the command needs a configuration file
    pub fn needs_config(&self) -> bool {
        !matches!(self, Command::Status { .. } | Command::Abandon { .. })
    }
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Command::Deploy { target, .. }
            | Command::Rollout { target, .. }
            | Command::Data {
                action: DataAction::Push { target, .. },
            } if target.trim().is_empty() => Err("Target environment must not be empty".to_string()),
            Command::Deploy { tag: Some(tag), .. } | Command::Rollout { tag: Some(tag), .. }
                if tag.trim().is_empty() =>
            {
                Err("--tag must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Settings derived from the command line
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    output: super::OutputManager,
    /// Umbrella project directory
    pub project_dir: PathBuf,
    /// Explicit configuration file
    pub config_path: Option<PathBuf>,
    /// Persist release state
    pub save: bool,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
            project_dir: args.project_dir.clone(),
            config_path: args.config.clone(),
            save: !args.no_save,
        }
    }
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }

    /// Print message
    pub fn println(&self, message: &str) {
        self.output.println(message);
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print success message
    pub fn success_println(&self, message: &str) {
        self.output.success(message);
    }

    /// Check if verbose output is enabled
    pub fn is_verbose(&self) -> bool {
        self.output.is_verbose()
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.output.is_quiet()
    }
}
