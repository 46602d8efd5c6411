//! Single-stage commands: discover, select, release, bump-versions,
//! update-pins and tag-umbrella.
//!
//! Every stage after `select` works on the saved release cycle.

use super::helpers::{load_context, resume_context};
use crate::cli::RuntimeConfig;
use crate::discovery::discover;
use crate::error::Result;
use crate::pins::update_pins;
use crate::prompt::ConsolePrompter;
use crate::release::release_packages;
use crate::selector::choose_packages;
use crate::tool::CommandPackageTool;
use crate::umbrella::tag_umbrella;
use crate::vcs::DetectedVcs;
use crate::version::bump_versions;

/// Execute discover command
pub(super) async fn execute_discover(config: &RuntimeConfig) -> Result<()> {
    let ctx = load_context(config)?;
    let tool = CommandPackageTool::new(ctx.config.tool.clone());
    let found = discover(&ctx.config, &ctx.root, &tool).await?;

    ctx.output.section("Packages available");
    for record in &found.packages {
        ctx.output.indent(&format!(
            "{} {} ({})",
            record.name,
            record.current_version,
            record.path.display()
        ));
    }
    for unresolved in &found.unresolved {
        ctx.output.warn(&format!(
            "Skipped {}: {}",
            unresolved.path.display(),
            unresolved.reason
        ));
    }
    Ok(())
}

/// Execute select command
pub(super) async fn execute_select(config: &RuntimeConfig, no_diff: bool) -> Result<()> {
    let mut ctx = load_context(config)?;
    let tool = CommandPackageTool::new(ctx.config.tool.clone());
    // an explicit select always starts a fresh selection
    choose_packages(&mut ctx, &DetectedVcs, &tool, &ConsolePrompter, !no_diff, false).await
}

/// Execute release command
pub(super) async fn execute_release(config: &RuntimeConfig) -> Result<()> {
    let mut ctx = resume_context(config).await?;
    let tool = CommandPackageTool::new(ctx.config.tool.clone());
    let report = release_packages(&mut ctx, &tool).await?;
    if !report.already_released.is_empty() {
        ctx.output.info(&format!(
            "{} package(s) were already released",
            report.already_released.len()
        ));
    }
    Ok(())
}

/// Execute bump-versions command
pub(super) async fn execute_bump_versions(config: &RuntimeConfig) -> Result<()> {
    let mut ctx = resume_context(config).await?;
    let report = bump_versions(&mut ctx, &DetectedVcs).await?;
    for (name, file) in &report.missing_file {
        ctx.output
            .verbose(&format!("{} has no {}", name, file.display()));
    }
    match report.failures.into_iter().next() {
        Some((_, first)) => Err(first),
        None => Ok(()),
    }
}

/// Execute update-pins command
pub(super) async fn execute_update_pins(config: &RuntimeConfig) -> Result<()> {
    let mut ctx = resume_context(config).await?;
    let update = update_pins(&mut ctx, &DetectedVcs).await?;
    if update.is_empty() {
        ctx.output.info("Nothing was released, pins left alone");
    }
    Ok(())
}

/// Execute tag-umbrella command
pub(super) async fn execute_tag_umbrella(config: &RuntimeConfig) -> Result<()> {
    let mut ctx = resume_context(config).await?;
    tag_umbrella(&mut ctx, &DetectedVcs, &ConsolePrompter).await?;
    Ok(())
}
