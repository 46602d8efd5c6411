//! Deploy and rollout command implementations.

use super::helpers::load_context;
use crate::cli::RuntimeConfig;
use crate::deploy::{DeployOptions, deploy};
use crate::error::{ReleaseError, Result, StateError};
use crate::prompt::ConsolePrompter;
use crate::rollout::{RolloutReport, SshShell, rollout_target};
use crate::tool::CommandPackageTool;
use crate::vcs::DetectedVcs;

fn print_report(config: &RuntimeConfig, report: &RolloutReport) {
    config.success_println(&format!(
        "{} is live on {} host(s) of {}",
        report.tag,
        report.hosts.len(),
        report.environment
    ));
}

/// Execute deploy command
pub(super) async fn execute_deploy(
    config: &RuntimeConfig,
    target: &str,
    no_diff: bool,
    tag: Option<&str>,
    parallel: bool,
) -> Result<()> {
    let mut ctx = load_context(config)?;
    ctx.config.environment(target)?.resolve(target)?;
    let tool = CommandPackageTool::new(ctx.config.tool.clone());
    let shell = SshShell::new()?;
    let options = DeployOptions {
        target,
        show_diff: !no_diff,
        tag,
        parallel,
    };
    let report = deploy(&mut ctx, &DetectedVcs, &tool, &shell, &ConsolePrompter, options).await?;
    print_report(config, &report);
    Ok(())
}

/// Execute rollout command
pub(super) async fn execute_rollout(
    config: &RuntimeConfig,
    target: &str,
    tag: Option<&str>,
    parallel: bool,
) -> Result<()> {
    let mut ctx = load_context(config)?;
    ctx.config.environment(target)?.resolve(target)?;
    // the tag of an interrupted cycle is the natural default
    if ctx.has_saved_state() {
        match ctx.load_saved().await {
            Ok(()) => {}
            Err(ReleaseError::State(StateError::NotFound)) => {}
            Err(e) => ctx
                .output
                .warn(&format!("Ignoring saved state: {}", e)),
        }
    }
    let shell = SshShell::new()?;
    let report = rollout_target(
        &mut ctx,
        &DetectedVcs,
        &shell,
        &ConsolePrompter,
        target,
        tag,
        parallel,
    )
    .await?;
    print_report(config, &report);
    Ok(())
}
