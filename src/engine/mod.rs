use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::fs;
use tokio::sync::mpsc;

use crate::cache::{CacheMiss, ManifestCache};
use crate::config::{self, InstallerConfig};
use crate::engine::models::{LocalInstallState, ManifestDocument, PackageConfig, VersionInfo};
use crate::engine::state::{HandoffDescriptor, InstallStatus, InstallerOutcome, SessionState, UserAction};
use crate::error::{FetchError, InstallerError, Result};
use crate::networking::{ManifestFetcher, NetworkClient};
use crate::resolver::{self, VersionResolver};
use crate::storage::StorageManager;

pub mod handoff;
pub mod models;
pub mod state;

/// Top-level controller: owns the manifest and install state for one session.
pub struct InstallOrchestrator<F = NetworkClient> {
    pub state: SessionState,
    config: InstallerConfig,
    cache: ManifestCache,
    fetcher: F,
    resolver: VersionResolver,
    storage: StorageManager,
    install_state: LocalInstallState,
    project_packages: PackageConfig,
    manifest: Option<ManifestDocument>,
}

impl<F: ManifestFetcher> InstallOrchestrator<F> {
    /// Load persisted state and prepare the workspace.
    ///
    /// Fails with [`InstallerError::PackageConfigMissing`] when the project has no
    /// package-config file; the host must fix that before the tool is usable.
    pub async fn open(config: InstallerConfig, fetcher: F) -> Result<Self> {
        let project_packages = resolver::read_package_config_async(&config.package_config_path).await?;
        let storage = StorageManager::new(&config.install_state_path);
        let install_state = storage.read_local_state().await;

        let orchestrator = Self {
            state: SessionState::Idle,
            cache: ManifestCache::new(config.manifest_cache_path()),
            resolver: VersionResolver::new(&config.sdk_library_root),
            fetcher,
            storage,
            install_state,
            project_packages,
            manifest: None,
            config,
        };
        orchestrator.ensure_workspace().await?;

        info!(
            "orchestrator: project {} (installed: {:?})",
            orchestrator.config.project_root.display(),
            orchestrator.install_state.install_version
        );
        debug!(
            "orchestrator: workspace={} sdk_library={}",
            orchestrator.config.workspace_dir.display(),
            orchestrator.config.sdk_library_root.display()
        );
        Ok(orchestrator)
    }

    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    pub fn resolver(&self) -> &VersionResolver {
        &self.resolver
    }

    pub fn manifest(&self) -> Option<&ManifestDocument> {
        self.manifest.as_ref()
    }

    /// Packages declared by the project's own package-config file.
    pub fn project_packages(&self) -> &PackageConfig {
        &self.project_packages
    }

    pub async fn resolve_manifest(&mut self, force_refresh: bool) -> Result<&ManifestDocument, FetchError> {
        self.resolve_manifest_at(force_refresh, Utc::now()).await
    }

    async fn resolve_manifest_at(
        &mut self,
        force_refresh: bool,
        now: DateTime<Utc>,
    ) -> Result<&ManifestDocument, FetchError> {
        if force_refresh {
            info!("resolve: forced refresh, dropping cached manifest");
            self.cache.invalidate().await;
        }

        let cached = match self.cache.load().await {
            Ok(doc) if ManifestCache::is_fresh(&doc, now, self.config.cache_ttl) => Some(doc),
            Ok(doc) => {
                debug!("resolve: cached manifest is stale (saved {:?})", doc.last_saved);
                None
            }
            Err(CacheMiss::NotFound) => None,
            Err(CacheMiss::Corrupt(reason)) => {
                debug!("resolve: cached manifest unusable ({reason})");
                None
            }
        };

        let doc = match cached {
            Some(doc) => {
                info!("resolve: using cached manifest");
                doc
            }
            None => {
                let mut doc = self
                    .fetcher
                    .fetch(&self.config.manifest_url, self.config.fetch_timeout)
                    .await
                    .inspect_err(|err| error!("resolve: fetch failed: {err}"))?;
                if let Err(err) = self.cache.save(&mut doc, now).await {
                    warn!("resolve: manifest fetched but not cached: {err}");
                }
                doc
            }
        };

        for warning in doc.warnings() {
            warn!("resolve: {warning}");
        }
        info!(
            "resolve: {} versions available, latest {:?}",
            doc.versions.len(),
            doc.latest
        );
        Ok(self.manifest.insert(doc))
    }

    pub fn version_names(&self) -> Result<Vec<String>> {
        let doc = self.manifest.as_ref().ok_or(InstallerError::NoManifest)?;
        Ok(VersionResolver::list_version_names(doc))
    }

    pub fn version_info(&self, name: &str) -> Result<&VersionInfo> {
        let doc = self.manifest.as_ref().ok_or(InstallerError::NoManifest)?;
        VersionResolver::version_info(doc, name)
    }

    pub fn installed_version(&self) -> &str {
        &self.install_state.install_version
    }

    pub fn install_state(&self) -> &LocalInstallState {
        &self.install_state
    }

    /// Persist `version` as installed.
    ///
    /// Call only once the installer reported success; [`Self::finish_install`]
    /// does that check for hosts that forward the installer's exit status.
    pub async fn record_install(&mut self, version: &str, ts: i64) -> Result<()> {
        let next = LocalInstallState {
            install_version: version.to_owned(),
            install_ts: ts,
        };
        self.storage.write_local_state(&next).await?;
        self.install_state = next;
        info!("orchestrator: recorded install of {version} (ts {ts})");
        Ok(())
    }

    pub fn install_status(&self) -> InstallStatus {
        if !self.install_state.has_installed() {
            return InstallStatus::NotInstalled;
        }
        let version = self.install_state.install_version.clone();
        let Some(info) = self.manifest.as_ref().and_then(|doc| doc.versions.get(&version)) else {
            return InstallStatus::Unlisted { version };
        };
        if info.ts == self.install_state.install_ts {
            InstallStatus::UpToDate { version }
        } else {
            InstallStatus::Outdated {
                version,
                installed_ts: self.install_state.install_ts,
                manifest_ts: info.ts,
            }
        }
    }

    /// Write the handoff file for an install of `version` into `project_root`.
    ///
    /// The process itself is left to the host.
    pub async fn prepare_install(&self, version: &str, project_root: &Path) -> Result<HandoffDescriptor> {
        self.ensure_workspace().await?;
        let project_root = config::absolutize(project_root.to_path_buf());
        let flavor = self.config.handoff_flavor;
        let args = handoff::install_args(&project_root, version);
        let args_path = self.config.workspace_dir.join(flavor.args_file_name());

        fs::write(&args_path, handoff::render_args(flavor, &args))
            .await
            .map_err(|e| InstallerError::io("unable to write install args", &args_path, e))?;
        info!(
            "orchestrator: handoff for {version} written to {}",
            args_path.display()
        );

        Ok(HandoffDescriptor {
            args_path,
            command: self.config.command_path(),
            args,
        })
    }

    pub async fn read_installer_outcome(&self) -> InstallerOutcome {
        match fs::read_to_string(self.config.installer_log_path()).await {
            Ok(text) => handoff::parse_outcome(&text),
            Err(_) => InstallerOutcome::Unknown,
        }
    }

    pub async fn clear_installer_outcome(&self) {
        let path = self.config.installer_log_path();
        if let Err(err) = fs::remove_file(&path).await
            && err.kind() != std::io::ErrorKind::NotFound
        {
            warn!("orchestrator: unable to clear {}: {err}", path.display());
        }
    }

    /// Combine the installer's exit status with its log and record successful installs.
    ///
    /// Never returns [`InstallerOutcome::Unknown`].
    pub async fn finish_install(&mut self, version: &str, exit_success: bool) -> Result<InstallerOutcome> {
        let outcome = match (exit_success, self.read_installer_outcome().await) {
            (_, InstallerOutcome::Failed(msg)) => InstallerOutcome::Failed(msg),
            (true, InstallerOutcome::Succeeded(msg)) => InstallerOutcome::Succeeded(msg),
            (true, InstallerOutcome::Unknown) => {
                InstallerOutcome::Succeeded("installer exited successfully".into())
            }
            (false, _) => InstallerOutcome::Failed("installer exited with an error".into()),
        };

        if let InstallerOutcome::Succeeded(_) = &outcome {
            let ts = self
                .manifest
                .as_ref()
                .and_then(|doc| doc.versions.get(version))
                .map(|info| info.ts)
                .unwrap_or_default();
            self.record_install(version, ts).await?;
        } else {
            warn!("orchestrator: install of {version} not recorded ({outcome:?})");
        }
        Ok(outcome)
    }

    /// Apply a host action. Actions that are not valid from the current state
    /// are logged and dropped without a transition.
    pub async fn handle_action(&mut self, action: UserAction, updates: &mpsc::UnboundedSender<SessionState>) {
        let next = match action {
            UserAction::LoadVersionList | UserAction::RefreshVersionList
                if matches!(self.state, SessionState::Installing { .. }) =>
            {
                warn!("action: version list reload ignored while an install is running");
                return;
            }
            UserAction::LoadVersionList => {
                info!("action: LoadVersionList");
                self.transition(SessionState::Resolving, updates);
                self.resolve_state(false).await
            }
            UserAction::RefreshVersionList => {
                info!("action: RefreshVersionList");
                self.transition(SessionState::Resolving, updates);
                self.resolve_state(true).await
            }
            UserAction::Install { version } => {
                if !matches!(self.state, SessionState::Ready { .. }) {
                    warn!(
                        "action: Install {version} ignored in state {}",
                        self.state.label()
                    );
                    return;
                }
                info!("action: Install {version}");
                match self.begin_install(&version).await {
                    Ok(handoff) => SessionState::Installing { version, handoff },
                    Err(err) => {
                        error!("install: {version} could not start: {err}");
                        SessionState::Failed(err.to_string())
                    }
                }
            }
            UserAction::InstallFinished { version, exit_success } => {
                let running = match &self.state {
                    SessionState::Installing { version: v, .. } => v == &version,
                    _ => false,
                };
                if !running {
                    warn!(
                        "action: InstallFinished {version} ignored in state {}",
                        self.state.label()
                    );
                    return;
                }
                info!("action: InstallFinished {version} (exit ok: {exit_success})");
                match self.finish_install(&version, exit_success).await {
                    Ok(InstallerOutcome::Succeeded(_)) => self.ready_state(),
                    Ok(InstallerOutcome::Failed(msg)) => SessionState::Failed(msg),
                    Ok(InstallerOutcome::Unknown) => self.ready_state(),
                    Err(err) => SessionState::Failed(err.to_string()),
                }
            }
        };
        self.transition(next, updates);
    }

    async fn resolve_state(&mut self, force_refresh: bool) -> SessionState {
        match self.resolve_manifest(force_refresh).await {
            Ok(_) => self.ready_state(),
            Err(err) => SessionState::Failed(err.to_string()),
        }
    }

    async fn begin_install(&self, version: &str) -> Result<HandoffDescriptor> {
        self.version_info(version)?;
        self.clear_installer_outcome().await;
        self.prepare_install(version, &self.config.project_root).await
    }

    fn ready_state(&self) -> SessionState {
        SessionState::Ready {
            latest: self
                .manifest
                .as_ref()
                .map(|doc| doc.latest.clone())
                .unwrap_or_default(),
            installed: self.install_state.install_version.clone(),
        }
    }

    fn transition(&mut self, next: SessionState, updates: &mpsc::UnboundedSender<SessionState>) {
        debug!("state: {} -> {}", self.state.label(), next.label());
        self.state = next.clone();
        updates.send(next).ok();
    }

    async fn ensure_workspace(&self) -> Result<()> {
        let workspace = &self.config.workspace_dir;
        fs::create_dir_all(workspace)
            .await
            .map_err(|e| InstallerError::io("unable to create workspace", workspace, e))?;

        let command = self.config.command_path();
        if fs::metadata(&command).await.is_ok() {
            return Ok(());
        }
        let script = handoff::command_script(self.config.handoff_flavor, &self.config.installer_script);
        fs::write(&command, script)
            .await
            .map_err(|e| InstallerError::io("unable to write installer command", &command, e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&command, std::fs::Permissions::from_mode(0o755))
                .await
                .map_err(|e| InstallerError::io("unable to mark installer command executable", &command, e))?;
        }
        debug!("orchestrator: wrote installer command {}", command.display());
        Ok(())
    }
}
