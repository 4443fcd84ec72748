//! Explicit configuration handed to every component.
//!
//! Nothing in the core reads global paths on its own; hosts build an
//! [`InstallerConfig`] once and tests point it at a temporary directory.

use std::path::PathBuf;
use std::time::Duration;

use crate::env;

pub const CACHE_TTL: Duration = Duration::from_secs(60 * 60);
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub const VERSION_LIST_FILE: &str = "version_list.json";
pub const INSTALL_STATE_FILE: &str = "guru-sdk-installer.json";
pub const PACKAGE_CONFIG_FILE: &str = "sdk-config.json";
pub const INSTALLER_LOG_FILE: &str = "log.txt";

/// Text form of the install handoff file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandoffFlavor {
    /// `export KEY=VALUE` lines, run through `cmd.command`.
    Posix,
    /// `set KEY=VALUE` lines, run through `cmd.bat`.
    Windows,
}

impl HandoffFlavor {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            HandoffFlavor::Windows
        } else {
            HandoffFlavor::Posix
        }
    }

    pub fn args_file_name(self) -> &'static str {
        match self {
            HandoffFlavor::Posix => "args",
            HandoffFlavor::Windows => "args.bat",
        }
    }

    pub fn command_file_name(self) -> &'static str {
        match self {
            HandoffFlavor::Posix => "cmd.command",
            HandoffFlavor::Windows => "cmd.bat",
        }
    }
}

#[derive(Clone, Debug)]
pub struct InstallerConfig {
    pub project_root: PathBuf,
    pub sdk_library_root: PathBuf,
    pub workspace_dir: PathBuf,
    pub install_state_path: PathBuf,
    pub package_config_path: PathBuf,
    pub installer_script: PathBuf,
    pub manifest_url: String,
    pub cache_ttl: Duration,
    pub fetch_timeout: Duration,
    pub handoff_flavor: HandoffFlavor,
}

impl InstallerConfig {
    /// Default layout for an editor project rooted at `project_root`.
    pub fn for_project(project_root: impl Into<PathBuf>) -> Self {
        let project_root = absolutize(project_root.into());
        Self {
            sdk_library_root: env::sdk_library_home(),
            workspace_dir: env::workspace_dir(&project_root),
            install_state_path: env::project_settings_dir(&project_root).join(INSTALL_STATE_FILE),
            package_config_path: env::project_packages_dir(&project_root).join(PACKAGE_CONFIG_FILE),
            installer_script: env::installer_script(),
            manifest_url: env::manifest_url(),
            cache_ttl: CACHE_TTL,
            fetch_timeout: FETCH_TIMEOUT,
            handoff_flavor: HandoffFlavor::current(),
            project_root,
        }
    }

    pub fn with_sdk_library_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sdk_library_root = root.into();
        self
    }

    pub fn with_workspace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace_dir = dir.into();
        self
    }

    pub fn with_manifest_url(mut self, url: impl Into<String>) -> Self {
        self.manifest_url = url.into();
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_installer_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.installer_script = script.into();
        self
    }

    pub fn with_handoff_flavor(mut self, flavor: HandoffFlavor) -> Self {
        self.handoff_flavor = flavor;
        self
    }

    pub fn manifest_cache_path(&self) -> PathBuf {
        self.workspace_dir.join(VERSION_LIST_FILE)
    }

    pub fn installer_log_path(&self) -> PathBuf {
        self.workspace_dir.join(INSTALLER_LOG_FILE)
    }

    pub fn command_path(&self) -> PathBuf {
        self.workspace_dir
            .join(self.handoff_flavor.command_file_name())
    }
}

pub(crate) fn absolutize(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    std::path::absolute(&path).unwrap_or(path)
}
