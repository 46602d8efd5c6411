//! Tag the umbrella configuration and bump its version marker.

use crate::context::Context;
use crate::error::{Result, VersionError};
use crate::prompt::{Prompter, ask_yes_no};
use crate::state::ReleasePhase;
use crate::vcs::{BUMP_MESSAGE, TAG_MESSAGE, VersionControl};
use crate::version::next_minor_version;

/// Tag the umbrella project at the version in its marker file
///
/// Returns the created tag, or `None` when nothing was released and the
/// operator declined to tag the configuration on its own.
///
/// The tag is recorded as soon as it exists. A run resumed after a failed
/// bump only redoes the bump of the marker file.
pub async fn tag_umbrella(
    ctx: &mut Context,
    vcs: &impl VersionControl,
    prompter: &impl Prompter,
) -> Result<Option<String>> {
    let version = match ctx.state.deploy_tag.clone() {
        Some(tag) => {
            ctx.output
                .info(&format!("Umbrella already tagged {}; finishing the bump", tag));
            tag
        }
        None => match create_umbrella_tag(ctx, vcs, prompter).await? {
            Some(tag) => tag,
            None => return Ok(None),
        },
    };

    let next = next_minor_version(&version)?;
    let version_file = ctx.path(&ctx.config.umbrella_version_file);
    tokio::fs::write(&version_file, format!("{}\n", next))
        .await
        .map_err(|e| VersionError::FileUpdateFailed {
            path: version_file.clone(),
            reason: e.to_string(),
        })?;
    vcs.commit(&version_file, BUMP_MESSAGE).await?;

    ctx.state
        .add_checkpoint(format!("umbrella tagged {}", version), ReleasePhase::UmbrellaTag);
    ctx.persist().await?;
    ctx.output
        .success(&format!("Tagged {}, next version is {}", version, next));
    Ok(Some(version))
}

async fn create_umbrella_tag(
    ctx: &mut Context,
    vcs: &impl VersionControl,
    prompter: &impl Prompter,
) -> Result<Option<String>> {
    if ctx.state.released().is_empty()
        && !ask_yes_no(
            prompter,
            "No packages were released. Do you want to release only the umbrella config?",
            false,
        )?
    {
        ctx.output.info("Not tagging the umbrella config");
        return Ok(None);
    }

    let version_file = ctx.path(&ctx.config.umbrella_version_file);
    let version = tokio::fs::read_to_string(&version_file)
        .await
        .map_err(|e| VersionError::FileUpdateFailed {
            path: version_file.clone(),
            reason: e.to_string(),
        })?
        .trim()
        .to_string();
    // refuse before tagging if the marker cannot be bumped afterwards
    next_minor_version(&version)?;

    ctx.output
        .progress(&format!("Tagging umbrella config at {}", version));
    vcs.create_tag(&ctx.root, &version, TAG_MESSAGE).await?;
    ctx.state.record_deploy_tag(&version);
    ctx.persist().await?;
    Ok(Some(version))
}
