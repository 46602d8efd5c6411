//! Write next development versions back into package version files.

use crate::context::Context;
use crate::error::{ReleaseError, Result, VersionError};
use crate::state::ReleasePhase;
use crate::vcs::{BUMP_MESSAGE, VersionControl};
use regex::RegexBuilder;
use std::path::PathBuf;

/// Outcome of a bump run
#[derive(Debug, Default)]
pub struct BumpReport {
    /// Packages whose version file was rewritten and committed
    pub bumped: Vec<(String, String)>,
    /// Packages without a version file at the expected location
    pub missing_file: Vec<(String, PathBuf)>,
    /// Packages that could not be bumped
    pub failures: Vec<(String, ReleaseError)>,
}

impl BumpReport {
    /// Whether every released package was handled
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Replace the version literal matched by `pattern` in `content`
///
/// Only the first match is touched; its first and third groups are kept
/// verbatim and the second becomes `next_version`. Returns `None` when the
/// pattern does not match.
pub fn substitute_version(content: &str, pattern: &str, next_version: &str) -> Result<Option<String>> {
    let regex = RegexBuilder::new(pattern)
        .multi_line(true)
        .build()
        .map_err(|e| VersionError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
    let Some(caps) = regex.captures(content) else {
        return Ok(None);
    };
    let (Some(whole), Some(prefix), Some(suffix)) = (caps.get(0), caps.get(1), caps.get(3)) else {
        return Err(VersionError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "needs three capture groups: prefix, version, suffix".to_string(),
        }
        .into());
    };

    let mut updated = String::with_capacity(content.len() + next_version.len());
    updated.push_str(&content[..whole.start()]);
    updated.push_str(prefix.as_str());
    updated.push_str(next_version);
    updated.push_str(suffix.as_str());
    updated.push_str(&content[whole.end()..]);
    Ok(Some(updated))
}

/// Next version recorded for a package, validated
fn checked_next_version(name: &str, next: Option<&str>) -> Result<String> {
    let next = next.ok_or_else(|| VersionError::InvalidVersionFormat {
        version: String::new(),
        reason: format!("no next version recorded for '{}'", name),
    })?;
    // the next version must itself be bumpable next cycle
    super::next_minor_version(next)?;
    Ok(next.to_string())
}

/// Bump and commit the version file of every released package
///
/// A package that fails is reported in the returned [`BumpReport`]; the
/// others are still bumped.
pub async fn bump_versions(ctx: &mut Context, vcs: &impl VersionControl) -> Result<BumpReport> {
    let mut report = BumpReport::default();
    let released: Vec<_> = ctx.state.released().into_iter().cloned().collect();
    if released.is_empty() {
        ctx.state.add_checkpoint("nothing to bump", ReleasePhase::VersionBump);
        ctx.persist().await?;
        return Ok(report);
    }

    ctx.output.section("Bumping package versions");
    for record in released {
        let name = record.name.clone();
        let next = match checked_next_version(&name, record.next_version.as_deref()) {
            Ok(next) => next,
            Err(e) => {
                ctx.output.error(&format!("{}: {}", name, e));
                report.failures.push((name, e));
                continue;
            }
        };

        let file = record.path.join(&record.version_file);
        if !file.exists() {
            log::info!("{} has no {}, not bumping", name, file.display());
            report.missing_file.push((name, file));
            continue;
        }

        match bump_file(&file, &record.version_pattern, &next, vcs).await {
            Ok(()) => {
                ctx.output.indent(&format!("{} {}", name, next));
                report.bumped.push((name, next));
            }
            Err(e) => {
                ctx.output.error(&format!("{}: {}", name, e));
                report.failures.push((name, e));
            }
        }
    }

    ctx.state.add_checkpoint("versions bumped", ReleasePhase::VersionBump);
    ctx.persist().await?;
    Ok(report)
}

async fn bump_file(
    file: &std::path::Path,
    pattern: &str,
    next: &str,
    vcs: &impl VersionControl,
) -> Result<()> {
    let update_failed = |reason: String| VersionError::FileUpdateFailed {
        path: file.to_path_buf(),
        reason,
    };
    let content = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| update_failed(e.to_string()))?;
    let updated = substitute_version(&content, pattern, next)?
        .ok_or_else(|| update_failed(format!("pattern '{}' does not match", pattern)))?;
    tokio::fs::write(file, updated)
        .await
        .map_err(|e| update_failed(e.to_string()))?;
    vcs.commit(file, BUMP_MESSAGE).await
}
