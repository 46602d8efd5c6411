//! Data snapshot command implementations.

use super::helpers::load_context;
use crate::cli::{DataAction, RuntimeConfig};
use crate::data::{fetch_saved_data, list_saved_data, push_saved_data, sync_data};
use crate::error::Result;
use crate::prompt::ConsolePrompter;
use crate::rollout::SshShell;

/// Execute data command
pub(super) async fn execute_data(config: &RuntimeConfig, action: &DataAction) -> Result<()> {
    let ctx = load_context(config)?;
    let shell = SshShell::new()?.with_agent_forwarding();

    match action {
        DataAction::List { filter } => {
            let files = list_saved_data(&ctx, &shell, filter).await?;
            if files.is_empty() {
                config.println("No saved data files");
            }
            for file in files {
                config.println(&file);
            }
        }
        DataAction::Fetch { file } => {
            fetch_saved_data(&ctx, &shell, &ConsolePrompter, file.as_deref()).await?;
        }
        DataAction::Push { target, file } => {
            let hosts = push_saved_data(&ctx, &shell, &ConsolePrompter, target, file.as_deref()).await?;
            config.success_println(&format!("Pushed to {}", hosts.join(", ")));
        }
        DataAction::Sync { role } => {
            let today = chrono::Local::now().date_naive();
            sync_data(&ctx, &shell, role, today).await?;
        }
    }
    Ok(())
}
