//! release_rollout - release buildout packages and roll the umbrella tag out.

use release_rollout::cli;
use release_rollout::cli::OutputManager;
use std::process;

#[tokio::main]
async fn main() {
    env_logger::init();

    match cli::run().await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            // never quiet for fatal errors
            let output = OutputManager::new(false, false);
            output.error(&format!("Fatal error: {e}"));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                output.println("\n💡 Recovery suggestions:");
                for suggestion in suggestions {
                    output.indent(&suggestion);
                }
            }

            process::exit(e.exit_code());
        }
    }
}
