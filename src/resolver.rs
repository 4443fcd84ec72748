use std::path::{Path, PathBuf};

use log::debug;

use crate::config::PACKAGE_CONFIG_FILE;
use crate::engine::models::{ManifestDocument, PackageConfig, VersionInfo};
use crate::error::{InstallerError, Result};

/// Read-only queries against a manifest and the local SDK library.
#[derive(Clone, Debug)]
pub struct VersionResolver {
    library_root: PathBuf,
}

impl VersionResolver {
    pub fn new(library_root: impl Into<PathBuf>) -> Self {
        Self {
            library_root: library_root.into(),
        }
    }

    /// Plain lexicographic order, so `"v10"` sorts before `"v2"`.
    pub fn list_version_names(doc: &ManifestDocument) -> Vec<String> {
        // BTreeMap keys are already unique and in byte order.
        doc.versions.keys().cloned().collect()
    }

    pub fn version_info<'a>(doc: &'a ManifestDocument, name: &str) -> Result<&'a VersionInfo> {
        doc.versions
            .get(name)
            .ok_or_else(|| InstallerError::VersionNotFound(name.to_owned()))
    }

    pub fn local_path_for(&self, version: &str) -> PathBuf {
        self.library_root.join(version)
    }

    pub fn package_config_path(&self, version: &str) -> PathBuf {
        self.local_path_for(version).join(PACKAGE_CONFIG_FILE)
    }

    pub fn is_version_cached_locally(&self, version: &str) -> bool {
        let cached = self.package_config_path(version).is_file();
        debug!("resolver: version {version} cached locally: {cached}");
        cached
    }

    /// Package layout shipped with a downloaded version.
    pub fn load_package_config(&self, version: &str) -> Result<PackageConfig> {
        read_package_config(&self.package_config_path(version))
    }
}

pub(crate) fn read_package_config(path: &Path) -> Result<PackageConfig> {
    parse_package_config(path, std::fs::read_to_string(path))
}

/// Same as [`read_package_config`], without blocking the runtime.
pub(crate) async fn read_package_config_async(path: &Path) -> Result<PackageConfig> {
    parse_package_config(path, tokio::fs::read_to_string(path).await)
}

fn parse_package_config(path: &Path, read: std::io::Result<String>) -> Result<PackageConfig> {
    let text = read.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            InstallerError::PackageConfigMissing(path.to_path_buf())
        } else {
            InstallerError::io("unable to read package config", path, e)
        }
    })?;
    serde_json::from_str(&text).map_err(|e| InstallerError::json(path, e))
}
