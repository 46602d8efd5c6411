//! The full release cycle: select, release, bump, pin, tag and roll out.
//!
//! Every stage after selection records a checkpoint in the release state, so
//! resuming a saved cycle skips the stages that already completed.

use crate::context::Context;
use crate::error::Result;
use crate::pins::update_pins;
use crate::prompt::Prompter;
use crate::release::release_packages;
use crate::rollout::{RemoteShell, RolloutReport, rollout_target};
use crate::selector::choose_packages;
use crate::state::ReleasePhase;
use crate::tool::PackageTool;
use crate::umbrella::tag_umbrella;
use crate::vcs::VersionControl;
use crate::version::bump_versions;

/// Knobs for one deploy run
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions<'a> {
    /// Environment to roll out to
    pub target: &'a str,
    /// Offer diffs during selection
    pub show_diff: bool,
    /// Tag to roll out instead of the one created this cycle
    pub tag: Option<&'a str>,
    /// Roll out to all hosts concurrently
    pub parallel: bool,
}

/// Show the release-manager ticket query and wait for the operator
pub fn tracker_notice(ctx: &Context, prompter: &impl Prompter) -> Result<()> {
    let Some(link) = ctx.config.tracker_link() else {
        return Ok(());
    };
    ctx.output.banner("Are there any release manager tickets?");
    ctx.output
        .println(&format!("\nCheck the following URL before continuing:\n{}\n", link));
    prompter.ask("Press return to continue", None)?;
    Ok(())
}

/// Run the whole cycle for `options.target`
///
/// Promote-only targets skip straight to rolling out an existing tag. The
/// saved state is deleted once every host has been updated; after a failed
/// rollout it is kept so the cycle can be resumed.
pub async fn deploy(
    ctx: &mut Context,
    vcs: &impl VersionControl,
    tool: &impl PackageTool,
    shell: &impl RemoteShell,
    prompter: &impl Prompter,
    options: DeployOptions<'_>,
) -> Result<RolloutReport> {
    tracker_notice(ctx, prompter)?;

    // catch an undeployable target before any package is touched
    let environment = ctx.config.environment(options.target)?;
    environment.resolve(options.target)?;
    let promote_only = environment.promote_only;

    if promote_only {
        ctx.output.info(&format!(
            "{} only promotes existing tags; skipping the release stages",
            options.target
        ));
    } else {
        let resume = ctx.saves_state();
        choose_packages(ctx, vcs, tool, prompter, options.show_diff, resume).await?;
        run_release_stages(ctx, vcs, tool, prompter).await?;
    }

    let report = rollout_target(
        ctx,
        vcs,
        shell,
        prompter,
        options.target,
        options.tag,
        options.parallel,
    )
    .await?;

    if !promote_only {
        ctx.state
            .add_checkpoint("cycle complete", ReleasePhase::Completed);
        if ctx.saves_state() && ctx.has_saved_state() {
            ctx.discard_saved()?;
        }
        log::info!("release cycle {} complete", ctx.state.release_id);
    }
    tracker_notice(ctx, prompter)?;
    Ok(report)
}

/// Release, bump, pin and tag, skipping stages already checkpointed
pub async fn run_release_stages(
    ctx: &mut Context,
    vcs: &impl VersionControl,
    tool: &impl PackageTool,
    prompter: &impl Prompter,
) -> Result<()> {
    if ctx.state.has_completed(ReleasePhase::Release) {
        log::info!("packages already released this cycle");
    } else {
        release_packages(ctx, tool).await?;
    }

    if !ctx.state.has_completed(ReleasePhase::VersionBump) {
        let report = bump_versions(ctx, vcs).await?;
        for (name, error) in &report.failures {
            ctx.output
                .warn(&format!("{} was not bumped and needs a manual fix: {}", name, error));
        }
    }

    if !ctx.state.has_completed(ReleasePhase::PinsUpdate) {
        update_pins(ctx, vcs).await?;
    }

    if !ctx.state.has_completed(ReleasePhase::UmbrellaTag) {
        tag_umbrella(ctx, vcs, prompter).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvironmentConfig, ProjectConfig};
    use crate::error::{PublishError, ReleaseError};
    use crate::process::CommandOutput;
    use crate::testing::ScriptedPrompter;
    use crate::testing::{FakeShell, FakeTool, FakeVcs, VcsCall, context};
    use crate::vcs::TAG_MESSAGE;

    fn project() -> (tempfile::TempDir, ProjectConfig, FakeTool) {
        let root = tempfile::tempdir().unwrap();
        for dir in ["alpha", "beta"] {
            let pkg = root.path().join("src").join(dir);
            std::fs::create_dir_all(&pkg).unwrap();
            std::fs::write(pkg.join("setup.py"), "version = '1.0'\n").unwrap();
        }
        std::fs::create_dir_all(root.path().join("profiles")).unwrap();
        std::fs::write(root.path().join("profiles/versions.cfg"), "[versions]\nalpha = 0.9\n").unwrap();
        std::fs::write(root.path().join("version.txt"), "3.1\n").unwrap();

        let mut config = ProjectConfig {
            project_name: "acme".into(),
            ..ProjectConfig::default()
        };
        let qa = EnvironmentConfig {
            hosts: vec!["qa01".into()],
            base_path: "/var/db/zope/dev".into(),
            buildout_name: "acme".into(),
            supervisor_processes: vec!["instance".into()],
            ..EnvironmentConfig::default()
        };
        let prod = EnvironmentConfig {
            hosts: vec!["web01".into()],
            promote_only: true,
            ..qa.clone()
        };
        config.environments.insert("qa".into(), qa);
        config.environments.insert("prod".into(), prod);

        let tool = FakeTool::with(&[("alpha", "alpha", "1.0"), ("beta", "beta", "1.0")]);
        tool.script_release("alpha", CommandOutput::ok("Tagging alpha 1.0\n"));
        (root, config, tool)
    }

    fn options(target: &str) -> DeployOptions<'_> {
        DeployOptions {
            target,
            show_diff: false,
            ..DeployOptions::default()
        }
    }

    #[tokio::test]
    async fn full_cycle_releases_tags_and_rolls_out() {
        let (root, config, tool) = project();
        let vcs = FakeVcs::default();
        let shell = FakeShell::default();
        let mut ctx = context(root.path(), config);
        let prompter = ScriptedPrompter::new(["yes", "no"]);

        let report = deploy(&mut ctx, &vcs, &tool, &shell, &prompter, options("qa"))
            .await
            .unwrap();

        assert_eq!(report.tag, "3.1");
        assert!(vcs.calls().contains(&VcsCall::Tag(
            root.path().to_path_buf(),
            "3.1".into(),
            TAG_MESSAGE.into()
        )));
        let pins = std::fs::read_to_string(root.path().join("profiles/versions.cfg")).unwrap();
        assert!(pins.contains("alpha = 1.0"));
        assert!(shell.commands_on("qa01").contains(&"vcs switch 3.1".to_string()));
        // a completed cycle leaves no saved state behind
        assert!(!ctx.has_saved_state());
        assert_eq!(prompter.remaining(), 0);
    }

    #[tokio::test]
    async fn unsaved_run_ignores_a_previous_cycle() {
        let (root, config, tool) = project();
        let mut previous = context(root.path(), config.clone());
        previous.state.record_deploy_tag("9.9");
        for phase in [ReleasePhase::Release, ReleasePhase::VersionBump, ReleasePhase::PinsUpdate, ReleasePhase::UmbrellaTag] {
            previous.state.add_checkpoint("done", phase);
        }
        previous.persist().await.unwrap();
        drop(previous);

        let vcs = FakeVcs::default();
        let shell = FakeShell::default();
        let mut ctx = Context::new(config, root.path(), crate::cli::OutputManager::new(false, true), false);
        let prompter = ScriptedPrompter::new(["yes", "no"]);

        let report = deploy(&mut ctx, &vcs, &tool, &shell, &prompter, options("qa"))
            .await
            .unwrap();

        assert_eq!(report.tag, "3.1");
        assert!(!prompter
            .questions()
            .iter()
            .any(|q| q.contains("previously saved choices")));
        assert!(!ctx.has_saved_state());
    }

    #[tokio::test]
    async fn promote_only_target_skips_release_stages() {
        let (root, config, tool) = project();
        let vcs = FakeVcs::default();
        let shell = FakeShell::default();
        let mut ctx = context(root.path(), config);

        let report = deploy(
            &mut ctx,
            &vcs,
            &tool,
            &shell,
            &ScriptedPrompter::new(Vec::<String>::new()),
            DeployOptions {
                tag: Some("3.0"),
                ..options("prod")
            },
        )
        .await
        .unwrap();

        assert_eq!(report.tag, "3.0");
        assert!(tool.released().is_empty());
        assert!(vcs.calls().is_empty());
    }

    #[tokio::test]
    async fn tracker_notice_waits_for_return() {
        let (root, mut config, tool) = project();
        config.tracker_url = Some("https://trac.example.com/{project}/query".into());
        let vcs = FakeVcs::default();
        let shell = FakeShell::default();
        let mut ctx = context(root.path(), config);
        let prompter = ScriptedPrompter::new(["", ""]);

        deploy(
            &mut ctx,
            &vcs,
            &tool,
            &shell,
            &prompter,
            DeployOptions {
                tag: Some("3.0"),
                ..options("prod")
            },
        )
        .await
        .unwrap();

        assert_eq!(
            prompter.questions(),
            vec!["Press return to continue", "Press return to continue"]
        );
    }

    #[tokio::test]
    async fn resumed_cycle_skips_completed_stages() {
        let (root, config, tool) = project();
        let vcs = FakeVcs::default();
        let shell = FakeShell::default();
        shell.on("qa01", "bin/buildout", Ok(CommandOutput::failed(1, "conflict")));

        let mut ctx = context(root.path(), config.clone());
        let err = deploy(&mut ctx, &vcs, &tool, &shell, &ScriptedPrompter::new(["yes", "no"]), options("qa"))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_ROLLOUT);
        assert!(ctx.has_saved_state());
        drop(ctx);

        // second run resumes: nothing is released or tagged again
        let shell = FakeShell::default();
        let vcs_calls = vcs.calls().len();
        let mut ctx = context(root.path(), config);
        deploy(&mut ctx, &vcs, &tool, &shell, &ScriptedPrompter::new(["yes"]), options("qa"))
            .await
            .unwrap();
        assert_eq!(vcs.calls().len(), vcs_calls);
        assert_eq!(tool.released().len(), 1);
    }

    #[tokio::test]
    async fn release_tool_failure_stops_before_rollout() {
        let (root, config, tool) = project();
        let vcs = FakeVcs::default();
        let shell = FakeShell::default();
        let mut ctx = context(root.path(), config);

        let err = deploy(&mut ctx, &vcs, &tool, &shell, &ScriptedPrompter::new(["yes", "yes"]), options("qa"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::Publish(PublishError::ReleaseToolFailure { ref package, .. }) if package == "beta"
        ));
        assert!(shell.calls().is_empty());
    }
}
