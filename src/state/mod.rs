//! State management for release cycles.
//!
//! This module provides state tracking and persistence for the release
//! workflow, so an interrupted cycle can resume from its saved choices.

mod manager;
mod release_state;

pub use manager::{SaveStateResult, StateManager};
pub use release_state::{
    PackageRecord, ReleaseCheckpoint, ReleasePhase, ReleaseState, STATE_FORMAT_VERSION,
};
