//! Shared helper functions for command execution.

use crate::cli::RuntimeConfig;
use crate::config::ProjectConfig;
use crate::context::Context;
use crate::error::{ConfigError, ReleaseError, Result};
use std::path::PathBuf;

/// Absolute umbrella project directory
pub(super) fn project_root(config: &RuntimeConfig) -> Result<PathBuf> {
    config.project_dir.canonicalize().map_err(|e| {
        ReleaseError::Config(ConfigError::InvalidValue {
            key: "--project-dir".to_string(),
            reason: format!("{}: {}", config.project_dir.display(), e),
        })
    })
}

/// Context for commands that need a configuration file
pub(super) fn load_context(config: &RuntimeConfig) -> Result<Context> {
    let root = project_root(config)?;
    let project = ProjectConfig::load(&root, config.config_path.as_deref())?;
    Ok(Context::new(project, root, config.output().clone(), config.save))
}

/// Context for commands that only touch the saved state
///
/// A missing configuration file falls back to the defaults, so the default
/// state file location is used.
pub(super) fn load_state_context(config: &RuntimeConfig) -> Result<Context> {
    let root = project_root(config)?;
    let project = match ProjectConfig::load(&root, config.config_path.as_deref()) {
        Ok(project) => project,
        Err(ReleaseError::Config(ConfigError::NotFound { path })) => {
            log::debug!("{} not found, using default state location", path.display());
            ProjectConfig::default()
        }
        Err(e) => return Err(e),
    };
    Ok(Context::new(project, root, config.output().clone(), config.save))
}

/// Context with the saved state loaded, for single-stage commands
pub(super) async fn resume_context(config: &RuntimeConfig) -> Result<Context> {
    let mut ctx = load_context(config)?;
    ctx.load_saved().await?;
    Ok(ctx)
}
