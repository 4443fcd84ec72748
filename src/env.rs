use std::env;
use std::path::{Path, PathBuf};

pub const SDK_HOME_ENV: &str = "GURU_SDK_HOME";
pub const MANIFEST_URL_ENV: &str = "GURU_SDK_MANIFEST_URL";

pub const VERSION_LIST_URL: &str =
    "https://raw.githubusercontent.com/castbox/unity-gurusdk-library/refs/heads/main/version_list.json";

/// Returns the current user's home directory.
pub fn user_home() -> PathBuf {
    let home = match env::consts::OS {
        "windows" => env::var_os("USERPROFILE").or_else(|| env::var_os("HOME")),
        _ => env::var_os("HOME"),
    };
    home.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

/// Root of the per-user tool directory (`~/.guru/unity`).
pub fn guru_home() -> PathBuf {
    user_home().join(".guru").join("unity")
}

/// Directory holding one sub-directory per downloaded SDK version.
pub fn sdk_library_home() -> PathBuf {
    env::var_os(SDK_HOME_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| guru_home().join("guru-sdk"))
}

pub fn installer_script() -> PathBuf {
    guru_home().join("guru_unity_cli.py")
}

pub fn manifest_url() -> String {
    env::var(MANIFEST_URL_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| VERSION_LIST_URL.to_owned())
}

pub fn workspace_dir(project: &Path) -> PathBuf {
    project.join("Library").join("guru-sdk-installer")
}

pub fn project_settings_dir(project: &Path) -> PathBuf {
    project.join("ProjectSettings")
}

pub fn project_packages_dir(project: &Path) -> PathBuf {
    project.join("Packages")
}
