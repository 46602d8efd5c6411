//! Rolling an umbrella tag out to the hosts of a deployment target.

mod sequencer;
mod shell;

pub use sequencer::{HostPhase, HostReport, HostSequence, RolloutReport};
pub use shell::{RemoteShell, SshShell};

use crate::context::Context;
use crate::error::Result;
use crate::prompt::{Prompter, confirm_or_abort};
use crate::state::ReleasePhase;
use crate::vcs::VersionControl;
use crate::version::{latest_tag, sort_tags};

/// Pick the tag to deploy
///
/// An explicit tag wins, then the tag created earlier this cycle; otherwise
/// the operator is asked, defaulting to the newest umbrella tag.
pub async fn resolve_tag(
    ctx: &Context,
    vcs: &impl VersionControl,
    prompter: &impl Prompter,
    explicit: Option<&str>,
) -> Result<String> {
    if let Some(tag) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(tag.to_string());
    }
    if let Some(tag) = &ctx.state.deploy_tag {
        return Ok(tag.clone());
    }

    let tags = sort_tags(vcs.list_tags(&ctx.root).await?);
    let default = latest_tag(&tags).map(|t| t.as_str().to_string());
    loop {
        let answer = prompter.ask("What tag do you want to release?", default.as_deref())?;
        if !answer.is_empty() {
            return Ok(answer);
        }
    }
}

/// Roll `tag` (or the resolved default) out to every host of `target`
///
/// Configuration problems fail the target before any host is contacted.
/// Hosts that fail do not stop the others; the aggregate result is an
/// error when any host failed.
pub async fn rollout_target(
    ctx: &mut Context,
    vcs: &impl VersionControl,
    shell: &impl RemoteShell,
    prompter: &impl Prompter,
    target: &str,
    tag: Option<&str>,
    parallel: bool,
) -> Result<RolloutReport> {
    let environment = ctx.config.environment(target)?.clone();
    let plan = environment.resolve(target)?;
    if environment.confirm {
        confirm_or_abort(prompter, &format!("Releasing to {}.", target))?;
    }

    let tag = resolve_tag(ctx, vcs, prompter, tag).await?;
    let switch_command = vcs.switch_command(&ctx.root, &tag).await?;
    let parallel = parallel || ctx.config.rollout.parallel;

    ctx.output.section(&format!(
        "Releasing {} to {} ({} host(s){})",
        tag,
        target,
        plan.hosts.len(),
        if parallel { ", in parallel" } else { "" }
    ));
    let sequence = HostSequence {
        shell,
        plan: &plan,
        switch_command: &switch_command,
        tag: &tag,
        limits: &ctx.config.rollout,
    };
    let hosts = sequence.run_all(parallel).await;

    for report in &hosts {
        if report.succeeded() {
            ctx.output.success(&format!(
                "{}: done in {:.1}s",
                report.host,
                report.duration.as_secs_f64()
            ));
        } else {
            for error in &report.errors {
                ctx.output.error(&format!("{}: {}", report.host, error));
            }
        }
    }

    let report = RolloutReport {
        environment: target.to_string(),
        tag: tag.clone(),
        hosts,
    };
    if report.failed() == 0 {
        ctx.state
            .add_checkpoint(format!("{} rolled out to {}", tag, target), ReleasePhase::Rollout);
        ctx.persist().await?;
    }
    report.into_result()
}
