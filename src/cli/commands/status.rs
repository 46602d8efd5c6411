//! Status and abandon command implementations.
//!
//! Display or discard the saved release cycle.

use super::helpers::load_state_context;
use crate::cli::RuntimeConfig;
use crate::error::{ReleaseError, Result};
use crate::prompt::{ConsolePrompter, ask_yes_no};

/// Execute status command
pub(super) async fn execute_status(config: &RuntimeConfig, detailed: bool, json: bool) -> Result<()> {
    let mut ctx = load_state_context(config)?;

    if !ctx.has_saved_state() {
        if json {
            println!("{{\"status\": \"no_active_release\"}}");
        } else {
            config.println("No release cycle in progress");
        }
        return Ok(());
    }

    ctx.load_saved().await?;
    let state = &ctx.state;
    if json {
        let json_output = serde_json::to_string_pretty(state).map_err(ReleaseError::Json)?;
        println!("{}", json_output);
        return Ok(());
    }

    config.println(&format!("📊 {}", state.summary()));
    if let Some(tag) = &state.deploy_tag {
        config.println(&format!("Umbrella tag: {}", tag));
    }
    if !detailed {
        return Ok(());
    }

    config.println(&format!("Started: {}", state.started_at));
    config.println(&format!("Updated: {}", state.updated_at));

    config.println("\nPackages:");
    for record in state.ordered() {
        let mark = if record.selected_for_release { "*" } else { " " };
        let released = match (&record.released_version, &record.next_version) {
            (Some(released), Some(next)) => format!(" released {} (next {})", released, next),
            (Some(released), None) => format!(" released {}", released),
            _ => String::new(),
        };
        config.println(&format!(
            "  {} {} {}{}",
            mark, record.name, record.current_version, released
        ));
    }

    if !state.checkpoints.is_empty() {
        config.println("\nCheckpoints:");
        for checkpoint in &state.checkpoints {
            config.println(&format!("  ✓ {} ({})", checkpoint.name, checkpoint.phase));
        }
    }
    Ok(())
}

/// Execute abandon command
pub(super) async fn execute_abandon(config: &RuntimeConfig, yes: bool) -> Result<()> {
    let mut ctx = load_state_context(config)?;
    if !ctx.has_saved_state() {
        config.println("No release cycle to abandon");
        return Ok(());
    }

    if !yes {
        if let Ok(()) = ctx.load_saved().await {
            config.println(&format!("About to discard {}", ctx.state.summary()));
        }
        if !ask_yes_no(&ConsolePrompter, "Discard the saved release cycle?", false)? {
            config.println("Nothing discarded");
            return Ok(());
        }
    }

    ctx.discard_saved()?;
    config.success_println(&format!("Removed {}", ctx.state_path().display()));
    Ok(())
}
