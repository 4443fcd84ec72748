//! Error types shared by the installer core.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single manifest fetch.
///
/// Cloneable so one coalesced fetch result can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("manifest request to {url} timed out after {}s", .after.as_secs())]
    Timeout { url: String, after: Duration },

    #[error("manifest request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("manifest server {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("manifest from {url} is malformed: {message}")]
    Malformed { url: String, message: String },
}

impl FetchError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }
}

/// Main error type for the installer core.
#[derive(Debug, Error)]
pub enum InstallerError {
    #[error("version {0} is not listed in the manifest")]
    VersionNotFound(String),

    /// The project carries no package-config file; the tool cannot run until the host fixes it.
    #[error("package config not found at {}", .0.display())]
    PackageConfigMissing(PathBuf),

    #[error("no manifest loaded; resolve the version list first")]
    NoManifest,

    #[error("IO error at {}: {message}", .path.display())]
    Io {
        message: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl InstallerError {
    pub(crate) fn io(message: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InstallerError::Io {
            message: message.into(),
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        InstallerError::Json {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = InstallerError> = std::result::Result<T, E>;
