//! Core version-control capability used by the release workflow.
//!
//! The workflow never shells out to a VCS directly; it talks to a
//! [`VersionControl`] implementation. Backends live next to this module and
//! [`super::DetectedVcs`] picks one by inspecting the working copy.

use crate::error::Result;
use std::future::Future;
use std::path::Path;

/// Message used when committing bumped version files
pub const BUMP_MESSAGE: &str = "bumping version for next release";
/// Message used when committing the pins file
pub const PINS_MESSAGE: &str = "updating versions for release";
/// Message used when tagging the umbrella project
pub const TAG_MESSAGE: &str = "tagging for release";

/// Trait defining the version-control operations the release workflow needs
pub trait VersionControl {
    /// List tag identifiers for the working copy at `path`, unordered
    fn list_tags(&self, path: &Path) -> impl Future<Output = Result<Vec<String>>>;

    /// Render the difference between `tag` and the working copy at `path`
    fn diff_tag(&self, path: &Path, tag: &str) -> impl Future<Output = Result<String>>;

    /// Create `tag` from the working copy at `path`
    fn create_tag(&self, path: &Path, tag: &str, message: &str)
    -> impl Future<Output = Result<()>>;

    /// Commit the single file at `file` and publish the commit
    fn commit(&self, file: &Path, message: &str) -> impl Future<Output = Result<()>>;

    /// Shell command that, run inside a remote checkout of the working copy at
    /// `path`, moves it to `tag`
    fn switch_command(&self, path: &Path, tag: &str) -> impl Future<Output = Result<String>>;
}

/// Supported backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcsKind {
    /// Centralised, tags are copies under `tags/`
    Subversion,
    /// Distributed, tags are changesets
    Mercurial,
    /// Distributed, tags are refs
    Git,
}

impl VcsKind {
    /// Metadata directory marking a working copy of this kind
    pub fn marker(self) -> &'static str {
        match self {
            VcsKind::Subversion => ".svn",
            VcsKind::Mercurial => ".hg",
            VcsKind::Git => ".git",
        }
    }

    /// Client executable
    pub fn program(self) -> &'static str {
        match self {
            VcsKind::Subversion => "svn",
            VcsKind::Mercurial => "hg",
            VcsKind::Git => "git",
        }
    }

    /// Find the kind of the nearest enclosing working copy
    ///
    /// Walks from `path` up to the filesystem root; the first directory
    /// carrying a metadata marker decides.
    pub fn detect(path: &Path) -> Option<VcsKind> {
        const ORDER: [VcsKind; 3] = [VcsKind::Subversion, VcsKind::Mercurial, VcsKind::Git];
        let start = if path.is_file() { path.parent()? } else { path };
        start.ancestors().find_map(|dir| {
            ORDER
                .into_iter()
                .find(|kind| dir.join(kind.marker()).exists())
        })
    }
}

impl std::fmt::Display for VcsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VcsKind::Subversion => write!(f, "Subversion"),
            VcsKind::Mercurial => write!(f, "Mercurial"),
            VcsKind::Git => write!(f, "Git"),
        }
    }
}
