use std::path::PathBuf;

// Session-level state the host renders from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Resolving,
    Ready {
        latest: String,
        installed: String,
    },
    Installing {
        version: String,
        handoff: HandoffDescriptor,
    },
    Failed(String),
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Resolving => "resolving",
            SessionState::Ready { .. } => "ready",
            SessionState::Installing { .. } => "installing",
            SessionState::Failed(_) => "failed",
        }
    }
}

/// Everything the host needs to launch the external installer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandoffDescriptor {
    /// The argument file that was written.
    pub args_path: PathBuf,
    /// Script the host should execute; it sources `args_path`.
    pub command: PathBuf,
    /// Key/value pairs in the order they were written.
    pub args: Vec<(String, String)>,
}

/// Result the external installer reported for a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstallerOutcome {
    Succeeded(String),
    Failed(String),
    Unknown,
}

/// How the recorded install relates to the loaded manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstallStatus {
    NotInstalled,
    UpToDate {
        version: String,
    },
    /// The manifest republished the installed version under another timestamp.
    Outdated {
        version: String,
        installed_ts: i64,
        manifest_ts: i64,
    },
    Unlisted {
        version: String,
    },
}

// Actions triggered by the host.
#[derive(Clone, Debug)]
pub enum UserAction {
    LoadVersionList,
    RefreshVersionList,
    Install {
        version: String,
    },
    InstallFinished {
        version: String,
        exit_success: bool,
    },
}
