//! Lifecycle orchestration.
//!
//! The only place that knows the full tracked set and the core/module
//! distinction. `list_all` drives source -> manifests -> reconcile for every
//! tracked package; `act` dispatches one transition and lists again.

pub mod jobs;
pub mod notify;

use log::{info, warn};
use std::fmt;
use std::sync::Arc;

use crate::config::{Config, TrackedPackage};
use crate::error::LifecycleError;
use crate::package::activator::resolve;
use crate::package::identity::headline;
use crate::package::manifest::LocalInfo;
use crate::package::reconcile::NO_DESCRIPTION;
use crate::package::{
    ManifestReader, PackageActivator, PackageDescriptor, PackageInstaller, RemoteInfo,
    RemoteVersion, reconcile,
};
use crate::runtime::Runtime;
use crate::source::ReleaseSource;

use jobs::{CoreUpdateJob, CoreUpdateQueue};
use notify::{Level, Notifier, send};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Install,
    Update,
    Enable,
    Disable,
    UpdateCore,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Install => "install",
            Action::Update => "update",
            Action::Enable => "enable",
            Action::Disable => "disable",
            Action::UpdateCore => "update-core",
        })
    }
}

/// Result of [`LifecycleManager::act`]: a human message plus the fresh listing.
#[derive(Debug)]
pub struct ActOutcome {
    pub message: String,
    pub packages: Vec<PackageDescriptor>,
}

pub struct LifecycleManager<R: Runtime + 'static> {
    config: Arc<Config>,
    source: Arc<dyn ReleaseSource>,
    reader: ManifestReader<R>,
    installer: Arc<PackageInstaller<R>>,
    activator: PackageActivator,
    notifier: Arc<dyn Notifier>,
    core_queue: CoreUpdateQueue,
}

impl<R: Runtime + 'static> LifecycleManager<R> {
    pub fn new(
        config: Arc<Config>,
        source: Arc<dyn ReleaseSource>,
        reader: ManifestReader<R>,
        installer: Arc<PackageInstaller<R>>,
        activator: PackageActivator,
        notifier: Arc<dyn Notifier>,
        core_queue: CoreUpdateQueue,
    ) -> Self {
        Self {
            config,
            source,
            reader,
            installer,
            activator,
            notifier,
            core_queue,
        }
    }

    /// Every tracked package, core first, then in configured order.
    ///
    /// An unreachable release source or a broken manifest degrades the
    /// affected entry only.
    #[tracing::instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<PackageDescriptor>, LifecycleError> {
        let installed = self.reader.list_installed()?;
        let mut packages = Vec::new();

        for tracked in self.config.tracked() {
            let remote = self.remote_info(&tracked).await;
            let local = if tracked.is_core {
                Some(self.reader.read_core(&self.config.core_dir(), &tracked.identity))
            } else {
                resolve(&tracked.identity, &installed, &self.config.module_prefix).cloned()
            };
            packages.push(reconcile(&tracked, &remote, local.as_ref()));
        }

        // tracked() already yields core first; keep it that way if that ever changes
        packages.sort_by_key(|p| !p.is_core);
        Ok(packages)
    }

    /// Perform `action` on `identity`, record the outcome, and list again.
    #[tracing::instrument(skip(self))]
    pub async fn act(&self, identity: &str, action: Action) -> Result<ActOutcome, LifecycleError> {
        let result = self.dispatch(identity, action).await;

        match &result {
            Ok((level, message)) => send(self.notifier.as_ref(), *level, message),
            Err(e @ LifecycleError::Forbidden(_)) => {
                send(self.notifier.as_ref(), Level::Warning, &e.to_string())
            }
            Err(e) => send(
                self.notifier.as_ref(),
                Level::Danger,
                &format!("Failed to {} {}: {}", action, identity, e),
            ),
        }

        let (_, message) = result?;
        let packages = self.list_all().await?;
        Ok(ActOutcome { message, packages })
    }

    /// Locally installed modules, as the manifest reader sees them.
    pub fn installed(&self) -> anyhow::Result<Vec<LocalInfo>> {
        self.reader.list_installed()
    }

    /// Stop the core update worker after it drained its queue.
    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.core_queue.shutdown().await
    }

    async fn dispatch(
        &self,
        identity: &str,
        action: Action,
    ) -> Result<(Level, String), LifecycleError> {
        let is_core = identity == self.config.core_identity();

        match action {
            Action::Install if is_core => Err(LifecycleError::Forbidden(
                "the core package cannot be installed, use update-core".to_string(),
            )),
            Action::Update | Action::UpdateCore if is_core => self.queue_core_update().await,
            Action::UpdateCore => Err(LifecycleError::Forbidden(format!(
                "update-core does not apply to '{}'",
                identity
            ))),
            Action::Install | Action::Update => self.install(identity, action).await,
            Action::Enable | Action::Disable => {
                let installed: Vec<LocalInfo> = self.reader.list_installed()?;
                let activation = self.activator.set_enabled(
                    identity,
                    action == Action::Enable,
                    &installed,
                )?;
                let state = if activation.enabled {
                    "enabled"
                } else {
                    "disabled"
                };
                Ok((Level::Success, format!("{} {}", activation.name, state)))
            }
        }
    }

    async fn install(&self, identity: &str, action: Action) -> Result<(Level, String), LifecycleError> {
        let tracked = self
            .config
            .tracked()
            .into_iter()
            .find(|t| t.identity == identity)
            .ok_or_else(|| LifecycleError::NotFound(identity.to_string()))?;

        let remote = self.remote_info(&tracked).await;
        let url = remote.download_url.as_deref().ok_or_else(|| LifecycleError::Download {
            identity: identity.to_string(),
            reason: "no release archive available".to_string(),
        })?;

        let installed = self.installer.install(identity, url).await?;
        let verb = if action == Action::Update {
            "updated"
        } else {
            "installed"
        };
        info!("{} {} {}", installed.name, installed.version, verb);
        Ok((
            Level::Success,
            format!("{} {} {}", remote.display_name, installed.version, verb),
        ))
    }

    async fn queue_core_update(&self) -> Result<(Level, String), LifecycleError> {
        let core = self
            .config
            .tracked()
            .into_iter()
            .find(|t| t.is_core)
            .ok_or_else(|| LifecycleError::NotFound(self.config.core_identity()))?;

        let remote = self.remote_info(&core).await;
        let (Some(url), RemoteVersion::Known(version)) = (remote.download_url, remote.version)
        else {
            return Err(LifecycleError::Download {
                identity: core.identity,
                reason: "no core release available".to_string(),
            });
        };

        self.core_queue.enqueue(CoreUpdateJob {
            archive_url: url,
            version: version.clone(),
        })?;
        Ok((Level::Info, format!("Core update to {} queued", version)))
    }

    async fn remote_info(&self, tracked: &TrackedPackage) -> RemoteInfo {
        let display_name = if tracked.is_core {
            "Core".to_string()
        } else {
            headline(&tracked.repo.repo, &self.config.module_prefix)
        };

        match self.source.latest_release(&tracked.repo).await {
            Ok(release) => RemoteInfo {
                description: release
                    .description()
                    .unwrap_or(NO_DESCRIPTION)
                    .to_string(),
                download_url: release
                    .archive_url(self.config.archive_format)
                    .map(String::from),
                version: RemoteVersion::Known(release.tag),
                display_name,
            },
            Err(e) => {
                warn!("No release information for {}: {:#}", tracked.repo, e);
                RemoteInfo::unavailable(display_name)
            }
        }
    }
}
