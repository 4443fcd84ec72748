//! Version-manifest resolution and install orchestration for the Guru SDK.
//!
//! [`InstallOrchestrator`] is the entry point: it resolves the remote version
//! list through a one-hour cache, answers version queries and writes the
//! handoff file an external installer consumes.

pub mod cache;
pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod networking;
pub mod process;
pub mod resolver;
pub mod storage;
pub mod util;

pub use cache::{CacheMiss, ManifestCache};
pub use config::{HandoffFlavor, InstallerConfig};
pub use engine::InstallOrchestrator;
pub use engine::models::{LocalInstallState, ManifestDocument, PackageConfig, PackageInfo, VersionInfo};
pub use engine::state::{HandoffDescriptor, InstallStatus, InstallerOutcome, SessionState, UserAction};
pub use error::{FetchError, InstallerError};
pub use networking::{CoalescingFetcher, ManifestFetcher, NetworkClient};
pub use resolver::VersionResolver;
