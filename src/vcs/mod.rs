//! Version control for package and umbrella working copies.
//!
//! This module exposes one capability trait, [`VersionControl`], implemented by
//! a Subversion backend and two distributed backends. [`DetectedVcs`] selects
//! the backend per call by inspecting the working copy.

mod git;
mod mercurial;
mod operations;
mod subversion;

pub use git::Git;
pub use mercurial::Mercurial;
pub use operations::{BUMP_MESSAGE, PINS_MESSAGE, TAG_MESSAGE, VcsKind, VersionControl};
pub use subversion::{Subversion, tags_url};

use crate::error::{Result, VcsError};
use crate::process::{self, CommandOutput};
use std::path::Path;
use std::time::Duration;

/// Upper bound for any single VCS client invocation
pub(crate) const VCS_TIMEOUT: Duration = Duration::from_secs(600);

/// Run a VCS client, turning non-zero exits into [`VcsError::CommandFailed`]
pub(crate) async fn run_vcs(kind: VcsKind, args: &[&str], cwd: &Path) -> Result<CommandOutput> {
    let output = process::run_program(kind.program(), args, cwd, Some(VCS_TIMEOUT)).await?;
    if !output.success {
        return Err(VcsError::CommandFailed {
            command: format!("{} {}", kind.program(), args.join(" ")),
            reason: output.failure_reason(),
        }
        .into());
    }
    Ok(output)
}

/// Backend chosen for one working copy
#[derive(Debug, Clone, Copy)]
pub enum Backend {
    /// Subversion
    Subversion(Subversion),
    /// Mercurial
    Mercurial(Mercurial),
    /// Git
    Git(Git),
}

impl Backend {
    /// Inspect `path` and return the matching backend
    pub fn for_path(path: &Path) -> Result<Self> {
        let kind = VcsKind::detect(path).ok_or_else(|| VcsError::NotWorkingCopy {
            path: path.to_path_buf(),
        })?;
        if which::which(kind.program()).is_err() {
            return Err(VcsError::ToolMissing {
                program: kind.program().to_string(),
            }
            .into());
        }
        log::debug!("{} is a {} working copy", path.display(), kind);
        Ok(match kind {
            VcsKind::Subversion => Backend::Subversion(Subversion),
            VcsKind::Mercurial => Backend::Mercurial(Mercurial),
            VcsKind::Git => Backend::Git(Git),
        })
    }
}

/// [`VersionControl`] that dispatches to the backend of each working copy
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectedVcs;

impl VersionControl for DetectedVcs {
    async fn list_tags(&self, path: &Path) -> Result<Vec<String>> {
        match Backend::for_path(path)? {
            Backend::Subversion(b) => b.list_tags(path).await,
            Backend::Mercurial(b) => b.list_tags(path).await,
            Backend::Git(b) => b.list_tags(path).await,
        }
    }

    async fn diff_tag(&self, path: &Path, tag: &str) -> Result<String> {
        match Backend::for_path(path)? {
            Backend::Subversion(b) => b.diff_tag(path, tag).await,
            Backend::Mercurial(b) => b.diff_tag(path, tag).await,
            Backend::Git(b) => b.diff_tag(path, tag).await,
        }
    }

    async fn create_tag(&self, path: &Path, tag: &str, message: &str) -> Result<()> {
        match Backend::for_path(path)? {
            Backend::Subversion(b) => b.create_tag(path, tag, message).await,
            Backend::Mercurial(b) => b.create_tag(path, tag, message).await,
            Backend::Git(b) => b.create_tag(path, tag, message).await,
        }
    }

    async fn commit(&self, file: &Path, message: &str) -> Result<()> {
        match Backend::for_path(file)? {
            Backend::Subversion(b) => b.commit(file, message).await,
            Backend::Mercurial(b) => b.commit(file, message).await,
            Backend::Git(b) => b.commit(file, message).await,
        }
    }

    async fn switch_command(&self, path: &Path, tag: &str) -> Result<String> {
        match Backend::for_path(path)? {
            Backend::Subversion(b) => b.switch_command(path, tag).await,
            Backend::Mercurial(b) => b.switch_command(path, tag).await,
            Backend::Git(b) => b.switch_command(path, tag).await,
        }
    }
}
