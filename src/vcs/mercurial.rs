//! Mercurial backend.

use super::{VcsKind, VersionControl, run_vcs};
use crate::error::{Result, VcsError};
use crate::process::{self, shell_quote};
use std::path::Path;

/// Mercurial working copies
#[derive(Debug, Clone, Copy, Default)]
pub struct Mercurial;

impl Mercurial {
    /// `hg push` exits 1 when there is nothing to push
    async fn push(&self, path: &Path) -> Result<()> {
        let output = process::run_program("hg", &["push"], path, Some(super::VCS_TIMEOUT)).await?;
        match output.exit_code {
            Some(0) | Some(1) => Ok(()),
            _ => Err(VcsError::CommandFailed {
                command: "hg push".to_string(),
                reason: output.failure_reason(),
            }
            .into()),
        }
    }
}

impl VersionControl for Mercurial {
    async fn list_tags(&self, path: &Path) -> Result<Vec<String>> {
        let output = run_vcs(VcsKind::Mercurial, &["tags", "-q"], path).await?;
        Ok(output
            .stdout_lines()
            .into_iter()
            .filter(|tag| tag != "tip")
            .collect())
    }

    async fn diff_tag(&self, path: &Path, tag: &str) -> Result<String> {
        let output = run_vcs(VcsKind::Mercurial, &["diff", "-r", tag, "."], path).await?;
        Ok(output.stdout)
    }

    async fn create_tag(&self, path: &Path, tag: &str, message: &str) -> Result<()> {
        run_vcs(VcsKind::Mercurial, &["tag", "-m", message, tag], path).await?;
        self.push(path).await
    }

    async fn commit(&self, file: &Path, message: &str) -> Result<()> {
        let dir = file.parent().unwrap_or(Path::new("."));
        let file_arg = file.to_string_lossy();
        run_vcs(VcsKind::Mercurial, &["commit", "-m", message, &file_arg], dir).await?;
        self.push(dir).await
    }

    async fn switch_command(&self, _path: &Path, tag: &str) -> Result<String> {
        Ok(format!("hg pull && hg update -r {}", shell_quote(tag)))
    }
}
