//! Subversion backend.
//!
//! Tags are server-side copies under the project's `tags/` directory, so every
//! operation works on repository URLs derived from the working copy.

use super::{VcsKind, VersionControl, run_vcs};
use crate::error::{Result, VcsError};
use crate::process::shell_quote;
use std::path::Path;

/// Subversion working copies
#[derive(Debug, Clone, Copy, Default)]
pub struct Subversion;

impl Subversion {
    /// Repository URL of the working copy at `path`
    async fn url(&self, path: &Path) -> Result<String> {
        let path_arg = path.to_string_lossy();
        let output = run_vcs(
            VcsKind::Subversion,
            &["info", "--show-item", "url", &path_arg],
            path,
        )
        .await?;
        let url = output.stdout.trim().to_string();
        if url.is_empty() {
            return Err(VcsError::CommandFailed {
                command: format!("svn info --show-item url {}", path_arg),
                reason: "no URL reported".to_string(),
            }
            .into());
        }
        Ok(url)
    }

    async fn tag_url(&self, path: &Path, tag: &str) -> Result<String> {
        let url = self.url(path).await?;
        Ok(format!("{}/{}", tags_url(&url)?, tag))
    }
}

/// Derive the `tags/` URL from a `trunk`, `branches/x` or `tags/x` URL
pub fn tags_url(url: &str) -> std::result::Result<String, VcsError> {
    let trimmed = url.trim().trim_end_matches('/');
    let mut parts: Vec<&str> = trimmed.split('/').collect();
    let layout_error = |reason: &str| VcsError::Layout {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    match parts.last().copied() {
        Some("trunk") => {
            parts.pop();
        }
        Some(_) if parts.len() >= 3 && matches!(parts[parts.len() - 2], "branches" | "tags") => {
            parts.truncate(parts.len() - 2);
        }
        _ => return Err(layout_error("expected trunk, branches/<name> or tags/<name>")),
    }
    if parts.len() < 3 {
        return Err(layout_error("no project directory above the layout"));
    }
    Ok(format!("{}/tags", parts.join("/")))
}

impl VersionControl for Subversion {
    async fn list_tags(&self, path: &Path) -> Result<Vec<String>> {
        let url = self.url(path).await?;
        let tags = tags_url(&url)?;
        let output = run_vcs(VcsKind::Subversion, &["list", &tags], path).await?;
        Ok(output
            .stdout_lines()
            .into_iter()
            .map(|line| line.trim_end_matches('/').to_string())
            .collect())
    }

    async fn diff_tag(&self, path: &Path, tag: &str) -> Result<String> {
        let url = self.url(path).await?;
        let tag_url = format!("{}/{}", tags_url(&url)?, tag);
        let output = run_vcs(VcsKind::Subversion, &["diff", &tag_url, &url], path).await?;
        Ok(output.stdout)
    }

    async fn create_tag(&self, path: &Path, tag: &str, message: &str) -> Result<()> {
        let url = self.url(path).await?;
        let tag_url = format!("{}/{}", tags_url(&url)?, tag);
        run_vcs(
            VcsKind::Subversion,
            &["copy", "-m", message, &url, &tag_url],
            path,
        )
        .await?;
        Ok(())
    }

    async fn commit(&self, file: &Path, message: &str) -> Result<()> {
        let dir = file.parent().unwrap_or(Path::new("."));
        let file_arg = file.to_string_lossy();
        run_vcs(
            VcsKind::Subversion,
            &["commit", "-m", message, &file_arg],
            dir,
        )
        .await?;
        Ok(())
    }

    async fn switch_command(&self, path: &Path, tag: &str) -> Result<String> {
        let tag_url = self.tag_url(path, tag).await?;
        Ok(format!("svn switch {}", shell_quote(&tag_url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_url_from_trunk() {
        assert_eq!(
            tags_url("https://svn.example.com/repo/acme.theme/trunk").unwrap(),
            "https://svn.example.com/repo/acme.theme/tags"
        );
        assert_eq!(
            tags_url("https://svn.example.com/repo/acme/trunk/").unwrap(),
            "https://svn.example.com/repo/acme/tags"
        );
    }

    #[test]
    fn tags_url_from_branch_or_tag() {
        assert_eq!(
            tags_url("svn+ssh://svn/repo/acme/branches/1.x").unwrap(),
            "svn+ssh://svn/repo/acme/tags"
        );
        assert_eq!(
            tags_url("svn+ssh://svn/repo/acme/tags/1.2").unwrap(),
            "svn+ssh://svn/repo/acme/tags"
        );
    }

    #[test]
    fn tags_url_rejects_unknown_layout() {
        assert!(matches!(
            tags_url("https://svn.example.com/repo/acme/src"),
            Err(VcsError::Layout { .. })
        ));
    }
}
