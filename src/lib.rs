//! # release_rollout
//!
//! Operator-driven release and rollout for buildout-based projects.
//!
//! One release cycle walks the package working copies of an umbrella
//! project, lets the operator pick the packages that need a release,
//! publishes them, bumps their version files, rewrites the version pins,
//! tags the umbrella configuration and rolls the tag out to the hosts of an
//! environment.
//!
//! ## Features
//!
//! - **Resumable cycles**: choices and progress are saved after every stage
//! - **Any VCS**: Subversion, Mercurial and Git working copies side by side
//! - **Safe rollouts**: supervised processes are restarted even when a build fails
//! - **Data snapshots**: list, fetch, push and sync database snapshots
//!
//! ## Usage
//!
//! ```bash
//! release_rollout deploy qa              # full cycle, rolled out to qa
//! release_rollout rollout prod --tag 2.4 # promote an existing tag
//! release_rollout status --detailed      # inspect the saved cycle
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cli;
pub mod config;
pub mod context;
pub mod data;
pub mod deploy;
pub mod discovery;
pub mod error;
pub mod pins;
pub mod process;
pub mod prompt;
pub mod release;
pub mod rollout;
pub mod selector;
pub mod state;
pub mod tool;
pub mod umbrella;
pub mod vcs;
pub mod version;

#[cfg(test)]
mod testing;

// Re-export main types for public API
pub use cli::Args;
pub use config::ProjectConfig;
pub use context::Context;
pub use error::{CliError, ReleaseError, Result};
pub use prompt::{ConsolePrompter, Prompter};
pub use rollout::{RemoteShell, SshShell};
pub use state::{ReleaseState, StateManager};
pub use tool::{CommandPackageTool, PackageTool};
pub use vcs::{DetectedVcs, VersionControl};
