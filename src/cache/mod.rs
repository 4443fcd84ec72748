//! Local copy of the version manifest with a time-based staleness rule.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info, warn};
use tokio::fs;

use crate::engine::models::ManifestDocument;
use crate::error::{InstallerError, Result};

/// Why no cached manifest could be used. Both variants force a refetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheMiss {
    NotFound,
    Corrupt(String),
}

#[derive(Clone, Debug)]
pub struct ManifestCache {
    path: PathBuf,
}

impl ManifestCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub async fn load(&self) -> std::result::Result<ManifestDocument, CacheMiss> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("cache: no manifest at {}", self.path.display());
                return Err(CacheMiss::NotFound);
            }
            Err(err) => {
                warn!("cache: unable to read {}: {err}", self.path.display());
                return Err(CacheMiss::Corrupt(err.to_string()));
            }
        };
        let doc: ManifestDocument = serde_json::from_str(&text).map_err(|err| {
            warn!("cache: discarding unparsable manifest: {err}");
            CacheMiss::Corrupt(err.to_string())
        })?;
        if doc.versions.is_empty() {
            warn!("cache: discarding manifest without versions");
            return Err(CacheMiss::Corrupt("manifest lists no versions".into()));
        }
        Ok(doc)
    }

    /// Fresh iff `0 <= now - last_saved <= ttl`.
    pub fn is_fresh(doc: &ManifestDocument, now: DateTime<Utc>, ttl: Duration) -> bool {
        let Some(saved) = doc.last_saved_at() else {
            return false;
        };
        let Ok(ttl) = TimeDelta::from_std(ttl) else {
            return false;
        };
        let age = now - saved;
        age >= TimeDelta::zero() && age <= ttl
    }

    pub async fn save(&self, doc: &mut ManifestDocument, now: DateTime<Utc>) -> Result<()> {
        doc.stamp_saved(now);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| InstallerError::io("unable to create cache dir", parent, e))?;
        }
        let bytes = serde_json::to_vec_pretty(doc).map_err(|e| InstallerError::json(&self.path, e))?;
        fs::write(&self.path, bytes)
            .await
            .map_err(|e| InstallerError::io("unable to write manifest cache", &self.path, e))?;
        info!("cache: saved manifest to {}", self.path.display());
        Ok(())
    }

    pub async fn invalidate(&self) {
        match fs::remove_file(&self.path).await {
            Ok(()) => debug!("cache: removed {}", self.path.display()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("cache: failed to remove {}: {err}", self.path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::models::VersionInfo;
    use chrono::TimeZone;

    const HOUR: Duration = Duration::from_secs(3600);

    fn sample_doc() -> ManifestDocument {
        let mut doc = ManifestDocument {
            latest: "1.1.0".into(),
            ..Default::default()
        };
        doc.versions.insert(
            "1.0.0".into(),
            VersionInfo {
                ts: 1_700_000_000,
                desc: "first".into(),
            },
        );
        doc.versions.insert(
            "1.1.0".into(),
            VersionInfo {
                ts: 1_710_000_000,
                desc: "second".into(),
            },
        );
        doc
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    fn saved_at(at: DateTime<Utc>) -> ManifestDocument {
        let mut doc = sample_doc();
        doc.stamp_saved(at);
        doc
    }

    #[test]
    fn fresh_within_the_hour() {
        assert!(ManifestCache::is_fresh(&saved_at(now()), now(), HOUR));
        assert!(ManifestCache::is_fresh(
            &saved_at(now() - TimeDelta::minutes(30)),
            now(),
            HOUR
        ));
        assert!(ManifestCache::is_fresh(
            &saved_at(now() - TimeDelta::seconds(3600)),
            now(),
            HOUR
        ));
    }

    #[test]
    fn stale_after_the_hour_or_from_the_future() {
        assert!(!ManifestCache::is_fresh(
            &saved_at(now() - TimeDelta::seconds(3601)),
            now(),
            HOUR
        ));
        assert!(!ManifestCache::is_fresh(
            &saved_at(now() - TimeDelta::hours(2)),
            now(),
            HOUR
        ));
        assert!(!ManifestCache::is_fresh(
            &saved_at(now() + TimeDelta::seconds(1)),
            now(),
            HOUR
        ));
    }

    #[test]
    fn unparsable_stamp_is_never_fresh() {
        let mut doc = sample_doc();
        assert!(!ManifestCache::is_fresh(&doc, now(), HOUR));
        doc.last_saved = "yesterday-ish".into();
        assert!(!ManifestCache::is_fresh(&doc, now(), HOUR));
    }

    #[tokio::test]
    async fn save_then_load_keeps_versions() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ManifestCache::new(dir.path().join("ws/version_list.json"));
        let mut doc = sample_doc();
        cache.save(&mut doc, now()).await.unwrap();

        let loaded = cache.load().await.unwrap();
        assert_eq!(loaded.versions, sample_doc().versions);
        assert_eq!(loaded.latest, "1.1.0");
        assert_eq!(loaded.last_saved_at(), Some(now()));
        assert!(ManifestCache::is_fresh(&loaded, now(), HOUR));
    }

    #[tokio::test]
    async fn load_reports_missing_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("version_list.json");
        let cache = ManifestCache::new(&path);
        assert_eq!(cache.load().await, Err(CacheMiss::NotFound));

        std::fs::write(&path, "{\"versions\": [").unwrap();
        assert!(matches!(cache.load().await, Err(CacheMiss::Corrupt(_))));

        std::fs::write(&path, r#"{"latest":"","versions":{}}"#).unwrap();
        assert!(matches!(cache.load().await, Err(CacheMiss::Corrupt(_))));
    }

    #[tokio::test]
    async fn invalidate_removes_copy_and_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ManifestCache::new(dir.path().join("version_list.json"));
        cache.invalidate().await;

        let mut doc = sample_doc();
        cache.save(&mut doc, now()).await.unwrap();
        assert!(cache.path().exists());
        cache.invalidate().await;
        assert!(!cache.path().exists());
        assert_eq!(cache.load().await, Err(CacheMiss::NotFound));
    }
}
