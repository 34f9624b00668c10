//! Service wiring for one CLI invocation.
//!
//! Construction of the collaborators (release source, registry, migrator,
//! installer, queue) is kept apart from the configuration values they are
//! built from.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::{
    config::{Config, build_http_client, resolve_root, settings_path},
    lifecycle::{LifecycleManager, jobs::CoreUpdateQueue, notify::FileNotifier},
    package::{ManifestReader, PackageActivator, PackageInstaller},
    registry::{CommandMigrator, FileRegistry},
    runtime::Runtime,
    settings::JsonSettingsStore,
    source::GitHubSource,
};

pub struct Services<R: Runtime + 'static> {
    pub runtime: Arc<R>,
    pub config: Arc<Config>,
    pub settings: Arc<JsonSettingsStore<R>>,
    pub notifier: Arc<FileNotifier<R>>,
    pub manager: LifecycleManager<R>,
}

impl<R: Runtime + 'static> Services<R> {
    /// Build every service. Spawns the core update worker, so this must run
    /// inside a tokio runtime.
    pub fn build(runtime: Arc<R>, root: Option<PathBuf>, api_url: Option<String>) -> Result<Self> {
        let root = resolve_root(runtime.as_ref(), root)?;
        let settings = Arc::new(JsonSettingsStore::new(
            runtime.clone(),
            settings_path(&root),
        ));
        let config = Arc::new(Config::load(
            runtime.as_ref(),
            root,
            api_url,
            settings.as_ref(),
        )?);

        let http_client = build_http_client(&config)?;
        let source = Arc::new(GitHubSource::new(http_client.clone(), &config.api_url));
        let registry = Arc::new(FileRegistry::new(
            runtime.clone(),
            config.modules_dir(),
            config.statuses_path(),
        ));
        let migrator = Arc::new(CommandMigrator::new(
            runtime.clone(),
            config.migrate_command.clone(),
            config.root.clone(),
        ));
        let notifier = Arc::new(FileNotifier::new(
            runtime.clone(),
            config.notifications_path(),
        ));
        let installer = Arc::new(PackageInstaller::new(
            runtime.clone(),
            config.clone(),
            http_client,
            registry.clone(),
            migrator,
        ));

        let core_queue = CoreUpdateQueue::start(installer.clone(), notifier.clone());
        let manager = LifecycleManager::new(
            config.clone(),
            source,
            ManifestReader::new(runtime.clone(), config.modules_dir(), registry.clone()),
            installer,
            PackageActivator::new(registry, &config.core_identity(), &config.module_prefix),
            notifier.clone(),
            core_queue,
        );

        Ok(Self {
            runtime,
            config,
            settings,
            notifier,
            manager,
        })
    }

    /// Drain queued jobs before the process exits.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.manager.shutdown().await
    }
}
