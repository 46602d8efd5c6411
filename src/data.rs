//! Database snapshots kept on the data server.
//!
//! Snapshots are `Data.fs-<project>-<role>-<date>-<NN>.tgz` archives in the
//! data directory of the first configured data host. Host-to-host copies run
//! on the remote side, so the shell passed here should forward the agent.

use crate::context::Context;
use crate::error::{CliError, ConfigError, Result, RolloutError};
use crate::process::shell_quote;
use crate::prompt::Prompter;
use crate::rollout::RemoteShell;
use chrono::NaiveDate;
use std::path::PathBuf;

/// Snapshot file name filter used when none is given
pub const DEFAULT_FILTER: &str = "*.tgz";

/// Roles whose data may be synced to the data server
pub const SYNC_ROLES: [&str; 2] = ["prod", "staging"];

const RULE: &str = "----------------------------------------------------------------";

/// Snapshot directory on the data host
pub fn data_dir(ctx: &Context) -> Result<String> {
    if let Some(full) = ctx.config.data.full_path.as_deref().filter(|p| !p.is_empty()) {
        return Ok(full.trim_end_matches('/').to_string());
    }
    Ok(format!(
        "{}/{}/data",
        ctx.config.data.base_path.trim_end_matches('/'),
        project_name(ctx)?
    ))
}

fn project_name(ctx: &Context) -> Result<&str> {
    let name = ctx.config.project_name.trim();
    if name.is_empty() {
        return Err(ConfigError::MissingValue {
            key: "project_name".to_string(),
        }
        .into());
    }
    Ok(name)
}

fn data_host(ctx: &Context) -> Result<&str> {
    ctx.config
        .data
        .hosts
        .iter()
        .map(|h| h.trim())
        .find(|h| !h.is_empty())
        .ok_or_else(|| {
            ConfigError::MissingValue {
                key: "data.hosts".to_string(),
            }
            .into()
        })
}

/// Snapshot archive name for `role` on `day`, numbered after `existing` ones
pub fn snapshot_name(project: &str, role: &str, day: NaiveDate, existing: usize) -> String {
    format!(
        "Data.fs-{}-{}-{}-{:02}.tgz",
        project,
        role,
        day.format("%Y-%m-%d"),
        existing + 1
    )
}

/// List snapshot files matching `filter`
///
/// An empty listing (no match) is not an error.
pub async fn list_saved_data(ctx: &Context, shell: &impl RemoteShell, filter: &str) -> Result<Vec<String>> {
    let host = data_host(ctx)?;
    let dir = data_dir(ctx)?;
    log::info!("{}: \"{}/{}\"", host, dir, filter);
    let output = shell
        .run(
            host,
            &format!("ls {}", filter),
            Some(&dir),
            ctx.config.rollout.command_timeout(),
        )
        .await?;
    if !output.success {
        log::debug!("no snapshots matching {}: {}", filter, output.failure_reason());
        return Ok(Vec::new());
    }
    Ok(output
        .stdout
        .split_whitespace()
        .map(str::to_string)
        .collect())
}

/// Ask which snapshot to use, defaulting to the newest
async fn choose_snapshot(
    ctx: &Context,
    shell: &impl RemoteShell,
    prompter: &impl Prompter,
    action: &str,
) -> Result<String> {
    let current = list_saved_data(ctx, shell, DEFAULT_FILTER).await?;
    let listing = if current.is_empty() {
        "No saved data files".to_string()
    } else {
        current.join("\n\t")
    };
    let question = format!(
        "\n{}\n\nCurrent saved data files:\n\n\t{}\n\nEnter a file name to {}:",
        RULE, listing, action
    );
    loop {
        let answer = prompter.ask(&question, current.last().map(String::as_str))?;
        if !answer.is_empty() {
            return Ok(answer);
        }
    }
}

/// Download a snapshot into the project root
pub async fn fetch_saved_data(
    ctx: &Context,
    shell: &impl RemoteShell,
    prompter: &impl Prompter,
    file: Option<&str>,
) -> Result<PathBuf> {
    let host = data_host(ctx)?;
    let file = match file {
        Some(file) => file.to_string(),
        None => choose_snapshot(ctx, shell, prompter, "retrieve").await?,
    };
    let remote = format!("{}/{}", data_dir(ctx)?, file);
    let local = ctx.path(&file);
    ctx.output.progress(&format!("Fetching {}:{}", host, remote));
    shell
        .fetch(host, &remote, &local, ctx.config.rollout.build_timeout())
        .await?;
    ctx.output.success(&format!("Saved {}", local.display()));
    Ok(local)
}

/// Copy a snapshot from the data host into `<buildout>/var` on every host of `target`
///
/// Every host is attempted; the hosts that failed are reported together.
pub async fn push_saved_data(
    ctx: &Context,
    shell: &impl RemoteShell,
    prompter: &impl Prompter,
    target: &str,
    file: Option<&str>,
) -> Result<Vec<String>> {
    let plan = ctx.config.environment(target)?.resolve(target)?;
    let host = data_host(ctx)?;
    let file = match file {
        Some(file) => file.to_string(),
        None => choose_snapshot(ctx, shell, prompter, "push").await?,
    };
    let source = format!("{}:{}/{}", host, data_dir(ctx)?, file);
    let var_dir = format!("{}/var", plan.buildout_dir);
    let command = format!("scp {} {}", shell_quote(&source), shell_quote(&var_dir));

    let mut pushed = Vec::new();
    for target_host in &plan.hosts {
        ctx.output
            .progress(&format!("Pushing {} to {}:{}", file, target_host, var_dir));
        match shell
            .run(target_host, &command, None, ctx.config.rollout.build_timeout())
            .await
        {
            Ok(output) if output.success => pushed.push(target_host.clone()),
            Ok(output) => ctx
                .output
                .warn(&format!("{}: {}", target_host, output.failure_reason())),
            Err(e) => ctx.output.warn(&format!("{}: {}", target_host, e)),
        }
    }

    if pushed.len() < plan.hosts.len() {
        return Err(RolloutError::HostsFailed {
            failed: plan.hosts.len() - pushed.len(),
            total: plan.hosts.len(),
        }
        .into());
    }
    Ok(pushed)
}

/// Snapshot the `Data.fs` of `role` onto the data server
///
/// The database is rsynced from the role's first host into
/// `<data>/current_prod`, archived there, and the archive moved into the
/// snapshot directory. Returns the archive name.
pub async fn sync_data(
    ctx: &Context,
    shell: &impl RemoteShell,
    role: &str,
    today: NaiveDate,
) -> Result<String> {
    if !SYNC_ROLES.contains(&role) {
        return Err(ConfigError::InvalidValue {
            key: "role".to_string(),
            reason: format!("must be one of {}, got '{}'", SYNC_ROLES.join(", "), role),
        }
        .into());
    }
    let project = project_name(ctx)?;
    let plan = ctx.config.environment(role)?.resolve(role)?;
    let data_host = data_host(ctx)?;
    let dir = data_dir(ctx)?;
    let staging_dir = format!("{}/current_prod", dir);
    let short = ctx.config.rollout.command_timeout();
    let long = ctx.config.rollout.build_timeout();

    ctx.output
        .info(&format!("Retrieving the Data.fs for {}", role));
    let pattern = format!("Data.fs-{}-{}-{}-*.tgz", project, role, today.format("%Y-%m-%d"));
    let existing = list_saved_data(ctx, shell, &pattern).await?.len();
    let archive = snapshot_name(project, role, today, existing);

    remote_ok(
        shell,
        data_host,
        &format!("mkdir -p {}", shell_quote(&staging_dir)),
        None,
        short,
    )
    .await?;

    let source = format!("{}:{}/var/filestorage/Data.fs", plan.hosts[0], plan.buildout_dir);
    remote_ok(
        shell,
        data_host,
        &format!("rsync -z --inplace {} {}", shell_quote(&source), shell_quote(&staging_dir)),
        None,
        long,
    )
    .await?;

    let tar = format!("tar czf {} Data.fs", shell_quote(&archive));
    if let Err(e) = remote_ok(shell, data_host, &tar, Some(&staging_dir), long).await {
        let cleanup = format!("rm -f {}", shell_quote(&archive));
        if let Err(cleanup_err) = remote_ok(shell, data_host, &cleanup, Some(&staging_dir), short).await {
            log::warn!("could not remove partial archive: {}", cleanup_err);
        }
        return Err(e);
    }
    remote_ok(
        shell,
        data_host,
        &format!("mv {} ..", shell_quote(&archive)),
        Some(&staging_dir),
        short,
    )
    .await?;

    ctx.output
        .success(&format!("Saved {}/{}", dir, archive));
    Ok(archive)
}

/// Run a remote command that must succeed
async fn remote_ok(
    shell: &impl RemoteShell,
    host: &str,
    command: &str,
    cwd: Option<&str>,
    timeout: std::time::Duration,
) -> Result<()> {
    let output = shell.run(host, command, cwd, timeout).await?;
    if !output.success {
        return Err(CliError::ExecutionFailed {
            command: format!("{} on {}", command, host),
            reason: output.failure_reason(),
        }
        .into());
    }
    Ok(())
}
