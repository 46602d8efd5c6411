//! Interactive release selection.
//!
//! For each discovered package the operator may review the diff against an
//! existing tag, then answers whether the package needs a release. The
//! answers are persisted once the loop finishes.

use crate::context::Context;
use crate::discovery;
use crate::error::Result;
use crate::prompt::{Prompter, ask_yes_no};
use crate::state::{ReleasePhase, ReleaseState};
use crate::tool::PackageTool;
use crate::vcs::VersionControl;
use crate::version::{latest_tag, sort_tags};

/// Answers that skip the diff review
pub const SKIP_TOKENS: [&str; 3] = ["none", "skip", "s"];

const RULE: &str = "----------------------------------------------------------------";

/// Build the selection for this cycle
///
/// With `resume_from_saved`, an existing saved state is offered first and,
/// when accepted, used verbatim. Otherwise any saved state is deleted.
pub async fn choose_packages(
    ctx: &mut Context,
    vcs: &impl VersionControl,
    tool: &impl PackageTool,
    prompter: &impl Prompter,
    show_diff: bool,
    resume_from_saved: bool,
) -> Result<()> {
    if ctx.has_saved_state() {
        if resume_from_saved
            && ask_yes_no(
                prompter,
                "Do you want to use the previously saved choices?",
                true,
            )?
        {
            ctx.load_saved().await?;
            ctx.output.info(&format!(
                "Using saved choices: {}",
                ctx.state.to_release.join(", ")
            ));
            return Ok(());
        }
        ctx.discard_saved()?;
    }

    let found = discovery::discover(&ctx.config, &ctx.root, tool).await?;
    for unresolved in &found.unresolved {
        ctx.output.warn(&format!(
            "Skipping {}: {}",
            unresolved.path.display(),
            unresolved.reason
        ));
    }
    ctx.state = ReleaseState::from_discovery(found.packages);

    ctx.output.section("Packages available");
    for name in &ctx.state.discovery_order {
        ctx.output.indent(name);
    }

    let names = ctx.state.discovery_order.clone();
    for name in &names {
        let Some(path) = ctx.state.packages.get(name).map(|r| r.path.clone()) else {
            continue;
        };
        if show_diff {
            review_diff(ctx, vcs, prompter, name, &path).await?;
        }
        let selected = ask_yes_no(prompter, &format!("Does '{}' need a release?", name), false)?;
        ctx.state.set_selected(name, selected);
    }

    ctx.state.add_checkpoint("packages selected", ReleasePhase::Selection);
    ctx.persist().await?;
    if ctx.state.to_release.is_empty() {
        ctx.output.info("No packages selected for release");
    } else {
        ctx.output
            .success(&format!("Selected: {}", ctx.state.to_release.join(", ")));
    }
    Ok(())
}

/// Offer a diff against one of the package's tags
async fn review_diff(
    ctx: &Context,
    vcs: &impl VersionControl,
    prompter: &impl Prompter,
    name: &str,
    path: &std::path::Path,
) -> Result<()> {
    let tags = match vcs.list_tags(path).await {
        Ok(tags) => sort_tags(tags),
        Err(e) => {
            ctx.output
                .warn(&format!("Cannot list tags for '{}', skipping diff: {}", name, e));
            return Ok(());
        }
    };

    let listing = if tags.is_empty() {
        "No tags created yet".to_string()
    } else {
        tags.iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join("\n    ")
    };
    let question = format!(
        "\n{}\n\nCurrent tags:\n    {}\nSelect a tag to compare with the current version, you can (s)kip\n{}",
        RULE, listing, name
    );
    let default = latest_tag(&tags).map_or("None", |t| t.as_str());

    let tag = loop {
        let answer = prompter.ask(&question, Some(default))?;
        if SKIP_TOKENS.contains(&answer.to_lowercase().as_str()) {
            return Ok(());
        }
        if let Some(tag) = tags.iter().find(|t| t.as_str() == answer) {
            break tag.as_str().to_string();
        }
        log::debug!("'{}' is not a tag of {}", answer, name);
    };

    let diff = vcs.diff_tag(path, &tag).await?;
    ctx.output.diff(&diff);
    Ok(())
}
