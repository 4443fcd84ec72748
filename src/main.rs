use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, warn};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;

use guru_sdk_installer::process::InstallerLauncher;
use guru_sdk_installer::util::{format_release_time, summary_line};
use guru_sdk_installer::{
    CoalescingFetcher, InstallOrchestrator, InstallStatus, InstallerConfig, InstallerError, NetworkClient,
    SessionState, UserAction, VersionResolver,
};

type Orchestrator = InstallOrchestrator<CoalescingFetcher<NetworkClient>>;

#[derive(Parser, Debug)]
#[command(
    name = "Guru SDK Installer",
    author,
    version,
    about = "Pick a Guru SDK version and hand it to the project installer"
)]
struct Cli {
    /// Editor project root; defaults to the current directory.
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    /// Fetch the version list from this URL instead of the published one.
    #[arg(long, global = true)]
    manifest_url: Option<String>,

    /// Log decisions as well as lifecycle steps.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Fail immediately when the version list cannot be downloaded.
    #[arg(long, global = true)]
    no_retry: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available SDK versions.
    List {
        /// Ignore the cached version list.
        #[arg(long)]
        refresh: bool,
    },
    /// Show details for one version.
    Info { version: String },
    /// Show the installed version and whether it is current.
    Status,
    /// Prepare the installer handoff for a version and run it.
    Install {
        version: String,
        /// Only write the handoff file; do not start the installer.
        #[arg(long)]
        no_run: bool,
    },
    /// Mark a version as installed after a manual installer run.
    Record { version: String },
    /// Open the installer workspace in the file browser.
    Workspace,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let Some(runtime) = build_runtime() else {
        return ExitCode::FAILURE;
    };
    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn build_runtime() -> Option<Runtime> {
    match Runtime::new() {
        Ok(rt) => Some(rt),
        Err(err) => {
            warn!("cli: failed to create multithreaded runtime ({err}); trying single-threaded runtime");
            match Builder::new_current_thread().enable_all().build() {
                Ok(rt) => Some(rt),
                Err(fallback_err) => {
                    error!("cli: failed to create any Tokio runtime ({fallback_err})");
                    None
                }
            }
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let project = match cli.project {
        Some(project) => project,
        None => std::env::current_dir().map_err(|e| format!("unable to read current directory: {e}"))?,
    };
    let mut config = InstallerConfig::for_project(project);
    if let Some(url) = cli.manifest_url {
        config = config.with_manifest_url(url);
    }

    let fetcher = CoalescingFetcher::new(NetworkClient::new());
    let mut orchestrator = InstallOrchestrator::open(config, fetcher)
        .await
        .map_err(|err| match err {
            InstallerError::PackageConfigMissing(path) => format!(
                "can not find {}; this project is not set up for the Guru SDK",
                path.display()
            ),
            other => other.to_string(),
        })?;
    let allow_retry = !cli.no_retry;

    match cli.command {
        Command::List { refresh } => {
            resolve(&mut orchestrator, refresh, allow_retry).await?;
            print_versions(&orchestrator);
        }
        Command::Info { version } => {
            resolve(&mut orchestrator, false, allow_retry).await?;
            print_version_info(&orchestrator, &version);
        }
        Command::Status => {
            resolve(&mut orchestrator, false, allow_retry).await?;
            print_status(&orchestrator);
        }
        Command::Install { version, no_run } => {
            resolve(&mut orchestrator, false, allow_retry).await?;
            install(&mut orchestrator, version, no_run).await?;
        }
        Command::Record { version } => {
            let ts = match resolve(&mut orchestrator, false, false).await {
                Ok(()) => orchestrator.version_info(&version).map(|info| info.ts).unwrap_or_default(),
                Err(err) => {
                    warn!("record: version list unavailable ({err}); storing without release time");
                    0
                }
            };
            orchestrator
                .record_install(&version, ts)
                .await
                .map_err(|e| e.to_string())?;
            println!("Recorded {version} as installed.");
        }
        Command::Workspace => {
            let workspace = &orchestrator.config().workspace_dir;
            open::that(workspace).map_err(|e| format!("unable to open {}: {e}", workspace.display()))?;
        }
    }
    Ok(())
}

async fn resolve(orchestrator: &mut Orchestrator, refresh: bool, allow_retry: bool) -> Result<(), String> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut action = if refresh {
        UserAction::RefreshVersionList
    } else {
        UserAction::LoadVersionList
    };
    loop {
        orchestrator.handle_action(action, &tx).await;
        report_updates(&mut rx);
        match &orchestrator.state {
            SessionState::Failed(msg) if allow_retry && offer_retry(msg) => {
                action = UserAction::LoadVersionList;
            }
            SessionState::Failed(msg) => return Err(format!("failed to get version list: {msg}")),
            _ => return Ok(()),
        }
    }
}

async fn install(orchestrator: &mut Orchestrator, version: String, no_run: bool) -> Result<(), String> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    orchestrator
        .handle_action(
            UserAction::Install {
                version: version.clone(),
            },
            &tx,
        )
        .await;
    report_updates(&mut rx);

    let handoff = match &orchestrator.state {
        SessionState::Installing { handoff, .. } => handoff.clone(),
        SessionState::Failed(msg) => return Err(msg.clone()),
        other => return Err(format!("unexpected state {}", other.label())),
    };
    println!("Handoff written to {}", handoff.args_path.display());
    if no_run {
        println!("Run {} to install {version}.", handoff.command.display());
        println!("Then record the result with `record {version}`.");
        return Ok(());
    }

    let launcher = InstallerLauncher::new(orchestrator.config().handoff_flavor);
    let exit_success = launcher.run(&handoff).await.unwrap_or_else(|err| {
        error!("install: {err}");
        false
    });
    orchestrator
        .handle_action(UserAction::InstallFinished { version: version.clone(), exit_success }, &tx)
        .await;
    report_updates(&mut rx);

    match &orchestrator.state {
        SessionState::Failed(msg) => Err(format!("install of {version} failed: {msg}")),
        _ => {
            println!("Installed {version}.");
            Ok(())
        }
    }
}

fn report_updates(rx: &mut mpsc::UnboundedReceiver<SessionState>) {
    while let Ok(state) = rx.try_recv() {
        if let SessionState::Resolving = state {
            eprintln!("Loading version list...");
        }
    }
}

fn offer_retry(message: &str) -> bool {
    eprintln!("Failed to get version list:\n{message}");
    if !io::stdin().is_terminal() {
        return false;
    }
    eprint!("Retry? [y/N] ");
    let _ = io::stderr().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}

fn print_versions(orchestrator: &Orchestrator) {
    let Some(doc) = orchestrator.manifest() else {
        return;
    };
    let installed = orchestrator.installed_version();
    let width = doc.versions.keys().map(String::len).max().unwrap_or(0);
    for name in VersionResolver::list_version_names(doc) {
        let mut tags = Vec::new();
        if name == doc.latest {
            tags.push("latest");
        }
        if name == installed {
            tags.push("installed");
        }
        if orchestrator.resolver().is_version_cached_locally(&name) {
            tags.push("cached");
        }
        let desc = doc
            .versions
            .get(&name)
            .map(|info| summary_line(&info.desc, 60))
            .unwrap_or_default();
        let marker = if name == installed { '*' } else { ' ' };
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", tags.join(", "))
        };
        println!("{marker} {name:<width$}{tags}  {desc}");
    }
}

fn print_version_info(orchestrator: &Orchestrator, version: &str) {
    let info = match orchestrator.version_info(version) {
        Ok(info) => info,
        Err(_) => {
            println!("Unknown sdk version: {version}");
            return;
        }
    };
    let resolver = orchestrator.resolver();
    let home = resolver.local_path_for(version);
    println!("Version:   {version}");
    println!("Released:  {}", format_release_time(info.ts));
    println!("Location:  {}", home.display());
    println!("Installed: {}", if orchestrator.installed_version() == version { "yes" } else { "no" });
    println!();
    println!("{}", info.desc.trim());

    if !resolver.is_version_cached_locally(version) {
        println!();
        println!("Not downloaded yet; installing will fetch it first.");
        return;
    }
    match resolver.load_package_config(version) {
        Ok(config) => {
            println!();
            println!("Packages:");
            for id in config.package_ids() {
                let package = &config.packages[id];
                let embedded = if package.embedded { " (embedded)" } else { "" };
                println!("  {id} [{}]{embedded}", package.group);
                for dep in &package.dependencies {
                    println!("    - {dep}");
                }
            }
        }
        Err(err) => println!("Version config unreadable, it needs to be downloaded again: {err}"),
    }
}

fn print_status(orchestrator: &Orchestrator) {
    match orchestrator.install_status() {
        InstallStatus::NotInstalled => println!("No SDK version installed."),
        InstallStatus::UpToDate { version } => println!("Installed {version} (current)."),
        InstallStatus::Outdated {
            version,
            installed_ts,
            manifest_ts,
        } => println!(
            "Installed {version} from {}, republished {}; reinstall to update.",
            format_release_time(installed_ts),
            format_release_time(manifest_ts)
        ),
        InstallStatus::Unlisted { version } => {
            println!("Installed {version}, which is no longer listed.")
        }
    }
    if let Some(doc) = orchestrator.manifest()
        && !doc.latest.is_empty()
        && doc.latest != orchestrator.installed_version()
    {
        println!("Latest available: {}", doc.latest);
    }
}
