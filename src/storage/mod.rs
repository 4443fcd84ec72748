use std::path::PathBuf;

use log::{debug, warn};
use tokio::fs;

use crate::engine::models::LocalInstallState;
use crate::error::{InstallerError, Result};

/// Reads and writes the project's install-state file.
#[derive(Clone, Debug)]
pub struct StorageManager {
    state_path: PathBuf,
}

impl StorageManager {
    pub fn new(state_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
        }
    }

    /// Missing or unreadable state means nothing is installed.
    pub async fn read_local_state(&self) -> LocalInstallState {
        let bytes = match fs::read(&self.state_path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(
                    "storage: no install state at {} ({err})",
                    self.state_path.display()
                );
                return LocalInstallState::default();
            }
        };
        serde_json::from_slice(&bytes).unwrap_or_else(|err| {
            warn!(
                "storage: ignoring unreadable install state {}: {err}",
                self.state_path.display()
            );
            LocalInstallState::default()
        })
    }

    pub async fn write_local_state(&self, state: &LocalInstallState) -> Result<()> {
        if let Some(parent) = self.state_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| InstallerError::io("unable to create state dir", parent, e))?;
        }
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| InstallerError::json(&self.state_path, e))?;
        fs::write(&self.state_path, bytes)
            .await
            .map_err(|e| InstallerError::io("unable to persist install state", &self.state_path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_state_reads_as_nothing_installed() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path().join("ProjectSettings/state.json"));
        assert_eq!(storage.read_local_state().await, LocalInstallState::default());
    }

    #[tokio::test]
    async fn writes_state_and_reads_it_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ProjectSettings/state.json");
        let storage = StorageManager::new(&path);
        let state = LocalInstallState {
            install_version: "1.2.0".into(),
            install_ts: 1_710_000_000,
        };
        storage.write_local_state(&state).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["install_version"], "1.2.0");
        assert_eq!(raw["install_ts"], 1_710_000_000);
        assert_eq!(storage.read_local_state().await, state);
    }

    #[tokio::test]
    async fn corrupt_state_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        let storage = StorageManager::new(&path);
        assert!(!storage.read_local_state().await.has_installed());
    }
}
