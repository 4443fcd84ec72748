use std::process::Stdio;

use log::{debug, info, warn};
use tokio::process::Command;

use crate::config::HandoffFlavor;
use crate::engine::state::HandoffDescriptor;

/// Host-side runner for the installer command written by the orchestrator.
#[derive(Clone, Copy, Debug)]
pub struct InstallerLauncher {
    flavor: HandoffFlavor,
}

impl InstallerLauncher {
    pub fn new(flavor: HandoffFlavor) -> Self {
        Self { flavor }
    }

    /// Run the handoff command to completion and report whether it exited cleanly.
    pub async fn run(&self, handoff: &HandoffDescriptor) -> Result<bool, String> {
        if !handoff.command.exists() {
            warn!("launch: installer command missing at {}", handoff.command.display());
            return Err(format!(
                "installer command not found at {}",
                handoff.command.display()
            ));
        }
        let workdir = handoff
            .command
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();

        let mut cmd = match self.flavor {
            HandoffFlavor::Windows => {
                let mut command = Command::new("cmd");
                command.arg("/C").arg(&handoff.command);
                command
            }
            HandoffFlavor::Posix => {
                let mut command = Command::new("sh");
                command.arg(&handoff.command);
                command
            }
        };
        cmd.current_dir(&workdir);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());
        // Hosts without a shell that sources the args file still see the values.
        for (key, value) in &handoff.args {
            cmd.env(key, value);
        }

        info!("launch: running {}", handoff.command.display());
        debug!("launch: workdir={} args={:?}", workdir.display(), handoff.args);
        let status = cmd
            .status()
            .await
            .map_err(|e| format!("failed to start installer: {e}"))?;
        info!("launch: installer exited with {status}");
        Ok(status.success())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn handoff_for(script: &str, dir: &std::path::Path) -> HandoffDescriptor {
        let command = dir.join("cmd.command");
        std::fs::write(&command, script).unwrap();
        HandoffDescriptor {
            args_path: dir.join("args"),
            command,
            args: vec![("VERSION".into(), "1.2.0".into())],
        }
    }

    #[tokio::test]
    async fn reports_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = InstallerLauncher::new(HandoffFlavor::Posix);

        let ok = handoff_for("#!/bin/sh\necho \"success: $VERSION\" > log.txt\n", dir.path());
        assert_eq!(launcher.run(&ok).await, Ok(true));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("log.txt")).unwrap().trim(),
            "success: 1.2.0"
        );

        let failing = handoff_for("#!/bin/sh\nexit 3\n", dir.path());
        assert_eq!(launcher.run(&failing).await, Ok(false));
    }

    #[tokio::test]
    async fn missing_command_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let handoff = HandoffDescriptor {
            args_path: dir.path().join("args"),
            command: dir.path().join("cmd.command"),
            args: Vec::new(),
        };
        assert!(InstallerLauncher::new(HandoffFlavor::Posix).run(&handoff).await.is_err());
    }
}
