//! Session context threaded through every workflow stage.

use crate::cli::OutputManager;
use crate::config::ProjectConfig;
use crate::error::Result;
use crate::state::{ReleaseState, StateManager};
use std::path::{Path, PathBuf};

/// Configuration, working directory, release state and output of one session
#[derive(Debug)]
pub struct Context {
    /// Project configuration
    pub config: ProjectConfig,
    /// Umbrella project root
    pub root: PathBuf,
    /// Release state of the current cycle
    pub state: ReleaseState,
    /// Operator-facing output
    pub output: OutputManager,
    store: StateManager,
    save: bool,
}

impl Context {
    /// Context for the project at `root`; `save` controls whether state is written
    pub fn new(config: ProjectConfig, root: impl Into<PathBuf>, output: OutputManager, save: bool) -> Self {
        let root = root.into();
        let store = StateManager::new(root.join(&config.state_file));
        Self {
            config,
            root,
            state: ReleaseState::new(),
            output,
            store,
            save,
        }
    }

    /// Resolve a project-relative path
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Whether choices are persisted between runs
    pub fn saves_state(&self) -> bool {
        self.save
    }

    /// Whether a saved state file is present
    pub fn has_saved_state(&self) -> bool {
        self.store.state_exists()
    }

    /// Location of the state file
    pub fn state_path(&self) -> &Path {
        self.store.path()
    }

    /// Write the current state, unless saving is disabled
    pub async fn persist(&mut self) -> Result<()> {
        if !self.save {
            return Ok(());
        }
        let result = self.store.save_state(&self.state).await?;
        self.output.verbose(&result.format_result());
        Ok(())
    }

    /// Replace the in-memory state with the saved one
    pub async fn load_saved(&mut self) -> Result<()> {
        self.state = self.store.load_state().await?;
        log::info!("resumed {}", self.state.summary());
        Ok(())
    }

    /// Delete the saved state file
    pub fn discard_saved(&mut self) -> Result<()> {
        self.store.cleanup_state()
    }
}
