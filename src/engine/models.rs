use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Short date/time layouts accepted for `last_saved` besides RFC 3339.
const LEGACY_SAVED_FORMATS: &[&str] = &["%m/%d/%Y %I:%M %p", "%m/%d/%Y %H:%M", "%m/%d/%Y %H:%M:%S"];

/// Remote list of installable SDK versions, also used as the cache file layout.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDocument {
    #[serde(default)]
    pub last_saved: String,
    #[serde(default)]
    pub latest: String,
    #[serde(default)]
    pub versions: BTreeMap<String, VersionInfo>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(default)]
    pub ts: i64,
    #[serde(default)]
    pub desc: String,
}

/// Tolerated inconsistencies in a manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ManifestWarning {
    LatestNotListed(String),
}

impl std::fmt::Display for ManifestWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManifestWarning::LatestNotListed(latest) => {
                write!(f, "latest version {latest} is not listed in versions")
            }
        }
    }
}

impl ManifestDocument {
    /// Parse the `last_saved` stamp; `None` when empty or unrecognised.
    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.last_saved.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        LEGACY_SAVED_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn stamp_saved(&mut self, now: DateTime<Utc>) {
        self.last_saved = now.to_rfc3339();
    }

    pub fn warnings(&self) -> Vec<ManifestWarning> {
        let mut warnings = Vec::new();
        if !self.latest.is_empty() && !self.versions.contains_key(&self.latest) {
            warnings.push(ManifestWarning::LatestNotListed(self.latest.clone()));
        }
        warnings
    }
}

/// Persisted record of the version installed into the project.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalInstallState {
    #[serde(default)]
    pub install_version: String,
    #[serde(default)]
    pub install_ts: i64,
}

impl LocalInstallState {
    pub fn has_installed(&self) -> bool {
        !self.install_version.is_empty()
    }
}

/// `sdk-config.json`: package layout of one SDK version or of the project.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    #[serde(default)]
    pub version: String,
    #[serde(default, deserialize_with = "lenient_ts")]
    pub ts: i64,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub packages: HashMap<String, PackageInfo>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub embedded: bool,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl PackageConfig {
    /// Package ids in display order.
    pub fn package_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.packages.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

// Older configs wrote `ts` as a quoted string.
fn lenient_ts<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTs {
        Int(i64),
        Text(String),
    }

    Ok(match RawTs::deserialize(deserializer)? {
        RawTs::Int(value) => value,
        RawTs::Text(text) => text.trim().parse().unwrap_or(0),
    })
}
