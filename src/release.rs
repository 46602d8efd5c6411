//! Build and publish selected packages.

use crate::context::Context;
use crate::error::{ConfigError, PublishError, Result, VersionError};
use crate::process::CommandOutput;
use crate::state::ReleasePhase;
use crate::tool::PackageTool;
use crate::version::compare_versions;
use regex::Regex;
use std::cmp::Ordering;

/// Outcome of one releaser run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    /// Packages published in this run, with their versions
    pub released: Vec<(String, String)>,
    /// Packages skipped because their current version was already released
    pub already_released: Vec<(String, String)>,
}

/// Find the published version in the release tool output
///
/// `template` is a regex in which `{name}` stands for the package name; its
/// first capture group is the version.
pub fn parse_released_version(template: &str, name: &str, output: &CommandOutput) -> Result<Option<String>> {
    let pattern = template.replace("{name}", &regex::escape(name));
    let regex = Regex::new(&pattern).map_err(|e| ConfigError::InvalidValue {
        key: "tool.tagged_pattern".to_string(),
        reason: e.to_string(),
    })?;
    let found = [&output.stdout, &output.stderr].into_iter().find_map(|text| {
        regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|v| !v.is_empty())
    });
    Ok(found)
}

/// Release every selected package, recording each success as it happens
///
/// The first tool failure aborts the run; packages released before it stay
/// recorded so a rerun continues where this one stopped.
pub async fn release_packages(ctx: &mut Context, tool: &impl PackageTool) -> Result<ReleaseReport> {
    let mut report = ReleaseReport::default();
    if ctx.state.to_release.is_empty() {
        ctx.output.warn("No packages to release.");
        ctx.state.add_checkpoint("nothing to release", ReleasePhase::Release);
        ctx.persist().await?;
        return Ok(report);
    }

    ctx.output.section("Releasing packages");
    for name in &ctx.state.to_release {
        ctx.output.indent(name);
    }

    for name in ctx.state.to_release.clone() {
        let record = ctx
            .state
            .packages
            .get(&name)
            .cloned()
            .ok_or_else(|| PublishError::UnknownPackage {
                package: name.clone(),
            })?;

        let current = tool.resolve(&record.path).await?.version;
        if let Some(released) = &record.released_version {
            if *released == current {
                let skipped = PublishError::AlreadyReleased {
                    package: name.clone(),
                    version: current.clone(),
                };
                ctx.output.warn(&skipped.to_string());
                report.already_released.push((name, current));
                continue;
            }
            if compare_versions(&current, released) == Ordering::Less {
                return Err(VersionError::Regression {
                    package: name,
                    current,
                    released: released.clone(),
                }
                .into());
            }
        }

        ctx.output
            .progress(&format!("Releasing {} {} to {}", name, current, record.target));
        let command = tool.release_command(&record.path, &name, &record.target);
        let output = tool.release(&record.path, &name, &record.target).await?;
        if !output.success {
            ctx.output.println(&output.stdout);
            return Err(PublishError::ReleaseToolFailure {
                package: name,
                command,
                reason: output.failure_reason(),
            }
            .into());
        }

        let Some(version) = parse_released_version(&ctx.config.tool.tagged_pattern, &name, &output)? else {
            ctx.output.println(&output.stdout);
            return Err(PublishError::ReleaseToolFailure {
                package: name,
                command,
                reason: "could not find the released version in the tool output".to_string(),
            }
            .into());
        };
        ctx.output.verbose(&output.stdout);

        ctx.state.record_release(&name, &version)?;
        ctx.persist().await?;
        ctx.output.success(&format!("Released {} {}", name, version));
        report.released.push((name, version));
    }

    ctx.state.add_checkpoint("packages released", ReleasePhase::Release);
    ctx.persist().await?;
    Ok(report)
}
