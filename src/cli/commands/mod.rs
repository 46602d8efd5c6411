//! Command execution functions coordinating the release cycle.
//!
//! Each command reports its own progress; this module turns the outcome into
//! a process exit code and prints recovery suggestions on failure.

mod data;
mod deploy;
mod helpers;
mod stages;
mod status;

use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::{EXIT_FAILURE, EXIT_SUCCESS, Result};

use data::execute_data;
use deploy::{execute_deploy, execute_rollout};
use stages::{
    execute_bump_versions, execute_discover, execute_release, execute_select,
    execute_tag_umbrella, execute_update_pins,
};
use status::{execute_abandon, execute_status};

/// Execute the command and map its outcome to an exit code
pub async fn execute_command(args: Args) -> Result<i32> {
    if let Err(validation_error) = args.validate() {
        // never quiet for argument errors
        let output = super::OutputManager::new(false, false);
        output.error(&format!("Invalid arguments: {}", validation_error));
        return Ok(EXIT_FAILURE);
    }

    let config = RuntimeConfig::from(&args);
    let result = match &args.command {
        Command::Deploy {
            target,
            no_diff,
            tag,
            parallel,
        } => execute_deploy(&config, target, *no_diff, tag.as_deref(), *parallel).await,
        Command::Discover => execute_discover(&config).await,
        Command::Select { no_diff } => execute_select(&config, *no_diff).await,
        Command::Release => execute_release(&config).await,
        Command::BumpVersions => execute_bump_versions(&config).await,
        Command::UpdatePins => execute_update_pins(&config).await,
        Command::TagUmbrella => execute_tag_umbrella(&config).await,
        Command::Rollout {
            target,
            tag,
            parallel,
        } => execute_rollout(&config, target, tag.as_deref(), *parallel).await,
        Command::Status { detailed, json } => execute_status(&config, *detailed, *json).await,
        Command::Abandon { yes } => execute_abandon(&config, *yes).await,
        Command::Data { action } => execute_data(&config, action).await,
    };

    match result {
        Ok(()) => {
            if config.is_verbose() {
                config.success_println(&format!(
                    "Command '{}' completed successfully",
                    args.command.name()
                ));
            }
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            config.error_println(&format!(
                "Command '{}' failed: {}",
                args.command.name(),
                e
            ));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() && !config.is_quiet() {
                config.println("\n💡 Recovery suggestions:");
                for suggestion in suggestions {
                    config.println(&format!("  • {}", suggestion));
                }
            }
            Ok(e.exit_code())
        }
    }
}
