//! State persistence for the release cycle.
//!
//! Saves are atomic (temp file, fsync, rename) and guarded by an advisory
//! lock file so two sessions on one umbrella project cannot interleave.

use crate::error::{Result, StateError};
use crate::state::ReleaseState;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Time allowed for acquiring the lock before giving up
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// State manager for persistent release state
#[derive(Debug)]
pub struct StateManager {
    /// Path to state file
    state_file_path: PathBuf,
    /// Path to lock file
    lock_file_path: PathBuf,
    /// Held lock, released on drop
    lock_handle: Option<FileLock>,
}

/// Advisory lock held for the lifetime of the manager
#[derive(Debug)]
struct FileLock {
    /// The flock is released when this handle is dropped
    #[cfg(unix)]
    _handle: nix::fcntl::Flock<fs::File>,
    #[cfg(not(unix))]
    _handle: fs::File,
}

/// Result of state saving operation
#[derive(Debug)]
pub struct SaveStateResult {
    /// Size of saved state file in bytes
    pub file_size_bytes: u64,
    /// Duration of save operation
    pub save_duration: Duration,
}

impl SaveStateResult {
    /// Format save result for display
    pub fn format_result(&self) -> String {
        format!(
            "State saved: {} bytes in {:.2}s",
            self.file_size_bytes,
            self.save_duration.as_secs_f64()
        )
    }
}

impl StateManager {
    /// Create a new state manager
    pub fn new<P: AsRef<Path>>(state_file_path: P) -> Self {
        let state_file_path = state_file_path.as_ref().to_path_buf();
        let lock_file_path = state_file_path.with_extension("lock");
        Self {
            state_file_path,
            lock_file_path,
            lock_handle: None,
        }
    }

    /// Location of the state file
    pub fn path(&self) -> &Path {
        &self.state_file_path
    }

    /// Save release state to file
    ///
    /// The state is written as is; saving what was just loaded reproduces the
    /// same file.
    pub async fn save_state(&mut self, state: &ReleaseState) -> Result<SaveStateResult> {
        let start_time = SystemTime::now();
        self.acquire_lock().await?;
        state.validate()?;

        let serialized =
            serde_json::to_string_pretty(state).map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to serialize state: {}", e),
            })?;

        let temp_file_path = self.state_file_path.with_extension("tmp");
        {
            let mut file =
                fs::File::create(&temp_file_path).map_err(|e| StateError::SaveFailed {
                    reason: format!("Failed to create temp file: {}", e),
                })?;
            file.write_all(serialized.as_bytes())
                .map_err(|e| StateError::SaveFailed {
                    reason: format!("Failed to write state: {}", e),
                })?;
            file.sync_all().map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to sync file: {}", e),
            })?;
        }
        fs::rename(&temp_file_path, &self.state_file_path).map_err(|e| StateError::SaveFailed {
            reason: format!("Failed to rename temp file: {}", e),
        })?;

        let file_size_bytes = fs::metadata(&self.state_file_path)
            .map(|m| m.len())
            .unwrap_or(0);
        log::debug!(
            "saved state #{} to {}",
            state.save_version,
            self.state_file_path.display()
        );
        Ok(SaveStateResult {
            file_size_bytes,
            save_duration: start_time.elapsed().unwrap_or_default(),
        })
    }

    /// Load release state from file
    pub async fn load_state(&mut self) -> Result<ReleaseState> {
        if !self.state_exists() {
            return Err(StateError::NotFound.into());
        }
        self.acquire_lock().await?;

        let mut contents = String::new();
        fs::File::open(&self.state_file_path)
            .and_then(|mut file| file.read_to_string(&mut contents))
            .map_err(|e| StateError::LoadFailed {
                reason: format!(
                    "Failed to read {}: {}",
                    self.state_file_path.display(),
                    e
                ),
            })?;

        // Check the format marker first so older layouts report a mismatch
        // rather than a parse error
        let raw: serde_json::Value =
            serde_json::from_str(&contents).map_err(|e| StateError::Corrupted {
                reason: format!("Failed to parse state: {}", e),
            })?;
        let found = raw.get("format_version").and_then(|v| v.as_u64());
        if found != Some(u64::from(super::STATE_FORMAT_VERSION)) {
            return Err(StateError::VersionMismatch {
                expected: super::STATE_FORMAT_VERSION.to_string(),
                found: found.map_or_else(|| "none".to_string(), |v| v.to_string()),
            }
            .into());
        }

        let state: ReleaseState =
            serde_json::from_value(raw).map_err(|e| StateError::Corrupted {
                reason: format!("Failed to deserialize state: {}", e),
            })?;
        state.validate()?;
        Ok(state)
    }

    /// Check if state file exists
    pub fn state_exists(&self) -> bool {
        self.state_file_path.exists()
    }

    /// Delete the state file
    pub fn cleanup_state(&self) -> Result<()> {
        if self.state_file_path.exists() {
            fs::remove_file(&self.state_file_path).map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to remove state file: {}", e),
            })?;
            log::debug!("removed {}", self.state_file_path.display());
        }
        Ok(())
    }

    /// Acquire file lock using advisory locking (flock)
    async fn acquire_lock(&mut self) -> Result<()> {
        if self.lock_handle.is_some() {
            return Ok(());
        }
        let start_time = SystemTime::now();

        loop {
            if start_time.elapsed().unwrap_or_default() >= LOCK_TIMEOUT {
                return Err(StateError::SaveFailed {
                    reason: format!(
                        "Timeout waiting for {}; is another session running?",
                        self.lock_file_path.display()
                    ),
                }
                .into());
            }

            let file = fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&self.lock_file_path)
                .map_err(|e| StateError::SaveFailed {
                    reason: format!("Failed to open lock file: {}", e),
                })?;

            #[cfg(unix)]
            {
                use nix::fcntl::{Flock, FlockArg};

                match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                    Ok(mut locked) => {
                        write_lock_info(&mut locked)?;
                        self.lock_handle = Some(FileLock { _handle: locked });
                        return Ok(());
                    }
                    Err((_, nix::errno::Errno::EWOULDBLOCK)) => {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        continue;
                    }
                    Err((_, e)) => {
                        return Err(StateError::SaveFailed {
                            reason: format!("flock error: {}", e),
                        }
                        .into());
                    }
                }
            }

            #[cfg(not(unix))]
            {
                let mut file = file;
                write_lock_info(&mut file)?;
                self.lock_handle = Some(FileLock { _handle: file });
                return Ok(());
            }
        }
    }
}

fn write_lock_info(file: &mut fs::File) -> Result<()> {
    let acquired_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let lock_data = serde_json::json!({
        "pid": std::process::id(),
        "acquired_at": acquired_at,
    });
    file.set_len(0).ok();
    file.write_all(lock_data.to_string().as_bytes())
        .map_err(|e| StateError::SaveFailed {
            reason: format!("Failed to write lock file: {}", e),
        })?;
    file.sync_all().ok();
    Ok(())
}

impl Drop for StateManager {
    fn drop(&mut self) {
        if self.lock_handle.take().is_some() {
            let _ = fs::remove_file(&self.lock_file_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReleaseError;
    use crate::state::{PackageRecord, ReleasePhase};

    fn sample() -> ReleaseState {
        let mut state = ReleaseState::from_discovery(vec![
            PackageRecord::new("acme.theme", "/work/src/acme.theme", "1.0"),
            PackageRecord::new("acme.policy", "/work/src/acme.policy", "2.3"),
        ]);
        state.set_selected("acme.policy", true);
        state.add_checkpoint("selected", ReleasePhase::Selection);
        state
    }

    #[tokio::test]
    async fn save_then_load_preserves_choices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".saved_choices.json");
        let mut manager = StateManager::new(&path);

        let state = sample();
        manager.save_state(&state).await.unwrap();
        assert!(!path.with_extension("tmp").exists());

        let loaded = manager.load_state().await.unwrap();
        assert_eq!(loaded.to_release, vec!["acme.policy"]);
        assert_eq!(loaded.discovery_order, state.discovery_order);
        assert_eq!(loaded.packages, state.packages);
        assert!(loaded.has_completed(ReleasePhase::Selection));
    }

    #[tokio::test]
    async fn resaving_a_loaded_state_reproduces_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".saved_choices.json");
        let mut manager = StateManager::new(&path);

        let mut state = sample();
        state.record_release("acme.policy", "2.3").unwrap();
        state.deploy_tag = Some("4.1".into());
        manager.save_state(&state).await.unwrap();
        let first = fs::read_to_string(&path).unwrap();

        let loaded = manager.load_state().await.unwrap();
        manager.save_state(&loaded).await.unwrap();
        let second = fs::read_to_string(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(loaded.save_version, state.save_version);
        assert_eq!(loaded.updated_at, state.updated_at);
    }

    #[tokio::test]
    async fn load_missing_state_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = StateManager::new(dir.path().join("state.json"));
        assert!(matches!(
            manager.load_state().await,
            Err(ReleaseError::State(StateError::NotFound))
        ));
    }

    #[tokio::test]
    async fn load_refuses_other_format_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"format_version": 99, "packages": {}}"#).unwrap();
        let mut manager = StateManager::new(&path);
        assert!(matches!(
            manager.load_state().await,
            Err(ReleaseError::State(StateError::VersionMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn load_reports_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        let mut manager = StateManager::new(&path);
        assert!(matches!(
            manager.load_state().await,
            Err(ReleaseError::State(StateError::Corrupted { .. }))
        ));
    }

    #[tokio::test]
    async fn cleanup_removes_state_and_drop_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        {
            let mut manager = StateManager::new(&path);
            manager.save_state(&sample()).await.unwrap();
            assert!(path.with_extension("lock").exists());
            manager.cleanup_state().unwrap();
            assert!(!manager.state_exists());
        }
        assert!(!path.with_extension("lock").exists());
    }
}
