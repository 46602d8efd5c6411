//! Git backend.
//!
//! Tags and commits are local until pushed; both are pushed to `origin` when
//! the repository has one so remote hosts can check the tag out.

use super::{VcsKind, VersionControl, run_vcs};
use crate::error::Result;
use crate::process::shell_quote;
use std::path::Path;

/// Remote receiving tags and commits
const REMOTE: &str = "origin";

/// Git working copies
#[derive(Debug, Clone, Copy, Default)]
pub struct Git;

impl Git {
    async fn has_remote(&self, path: &Path) -> Result<bool> {
        let output = run_vcs(VcsKind::Git, &["remote"], path).await?;
        Ok(output.stdout_lines().iter().any(|r| r == REMOTE))
    }
}

impl VersionControl for Git {
    async fn list_tags(&self, path: &Path) -> Result<Vec<String>> {
        let output = run_vcs(VcsKind::Git, &["tag", "--list"], path).await?;
        Ok(output.stdout_lines())
    }

    async fn diff_tag(&self, path: &Path, tag: &str) -> Result<String> {
        let output = run_vcs(
            VcsKind::Git,
            &["diff", "--color=always", tag, "HEAD", "--", "."],
            path,
        )
        .await?;
        Ok(output.stdout)
    }

    async fn create_tag(&self, path: &Path, tag: &str, message: &str) -> Result<()> {
        run_vcs(VcsKind::Git, &["tag", "-a", tag, "-m", message], path).await?;
        if self.has_remote(path).await? {
            run_vcs(VcsKind::Git, &["push", REMOTE, tag], path).await?;
        } else {
            log::warn!("{} has no '{}' remote; tag {} stays local", path.display(), REMOTE, tag);
        }
        Ok(())
    }

    async fn commit(&self, file: &Path, message: &str) -> Result<()> {
        let dir = file.parent().unwrap_or(Path::new("."));
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        run_vcs(VcsKind::Git, &["commit", "-m", message, "--", &name], dir).await?;
        if self.has_remote(dir).await? {
            run_vcs(VcsKind::Git, &["push", REMOTE, "HEAD"], dir).await?;
        }
        Ok(())
    }

    async fn switch_command(&self, _path: &Path, tag: &str) -> Result<String> {
        Ok(format!(
            "git fetch --tags {} && git checkout -q {}",
            REMOTE,
            shell_quote(tag)
        ))
    }
}
