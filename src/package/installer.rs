//! Download, extract, place, register and migrate one package.

use anyhow::{Result, bail};
use log::{debug, info, warn};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::archive::{ArchiveExtractor, ArchiveExtractorImpl};
use crate::cleanup::TempPath;
use crate::config::Config;
use crate::download::download_file;
use crate::error::LifecycleError;
use crate::http::HttpClient;
use crate::registry::{Migrator, ModuleRegistry};
use crate::runtime::Runtime;

use super::identity::{capitalize, match_kind};
use super::lock::InstallLock;
use super::manifest::{DEFAULT_LOCAL_VERSION, LocalInfo, ManifestReader, read_manifest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledInfo {
    pub identity: String,
    pub name: String,
    pub version: String,
    pub path: PathBuf,
}

/// Where an install lands.
enum Target {
    /// `<modules>/<manifest name or identity>`, registered afterwards.
    Module,
    /// The fixed core directory.
    Core,
}

pub struct PackageInstaller<R: Runtime> {
    runtime: Arc<R>,
    config: Arc<Config>,
    http_client: HttpClient,
    extractor: ArchiveExtractorImpl,
    registry: Arc<dyn ModuleRegistry>,
    migrator: Arc<dyn Migrator>,
}

impl<R: Runtime> PackageInstaller<R> {
    pub fn new(
        runtime: Arc<R>,
        config: Arc<Config>,
        http_client: HttpClient,
        registry: Arc<dyn ModuleRegistry>,
        migrator: Arc<dyn Migrator>,
    ) -> Self {
        Self {
            runtime,
            config,
            http_client,
            extractor: ArchiveExtractorImpl::new(),
            registry,
            migrator,
        }
    }

    /// Install or replace a module from `archive_url`.
    #[tracing::instrument(skip(self))]
    pub async fn install(
        &self,
        identity: &str,
        archive_url: &str,
    ) -> Result<InstalledInfo, LifecycleError> {
        self.run(identity, archive_url, Target::Module).await
    }

    /// Replace the core package from `archive_url`.
    #[tracing::instrument(skip(self))]
    pub async fn install_core(&self, archive_url: &str) -> Result<InstalledInfo, LifecycleError> {
        let identity = self.config.core_identity();
        self.run(&identity, archive_url, Target::Core).await
    }

    async fn run(
        &self,
        identity: &str,
        archive_url: &str,
        target: Target,
    ) -> Result<InstalledInfo, LifecycleError> {
        let runtime = self.runtime.as_ref();
        let _lock = InstallLock::acquire(runtime, &self.config.locks_dir(), identity)?;

        // 1. download
        let tmp_dir = self.config.tmp_dir();
        runtime.create_dir_all(&tmp_dir)?;
        let archive = TempPath::new(
            runtime,
            tmp_dir.join(format!(
                "{}.{}",
                identity,
                self.config.archive_format.extension()
            )),
        );
        download_file(runtime, archive_url, archive.path(), &self.http_client)
            .await
            .map_err(|e| LifecycleError::download(identity, e))?;

        // 2. extract into staging next to the final location
        let parent = match target {
            Target::Module => self.config.modules_dir(),
            Target::Core => self.config.root.clone(),
        };
        runtime.create_dir_all(&parent)?;
        let staging = TempPath::fresh_dir(runtime, parent.join(format!(".staging-{}", identity)))?;
        self.extractor
            .extract(runtime, archive.path(), staging.path())
            .map_err(|e| LifecycleError::extract(identity, e))?;

        // 3. find the package inside
        let package_root = locate_package_root(runtime, staging.path())
            .map_err(|e| LifecycleError::extract(identity, e))?;

        let manifest = read_manifest(runtime, &package_root).unwrap_or_else(|e| {
            warn!("Ignoring unreadable manifest of {}: {:#}", identity, e);
            None
        });
        let has_manifest = manifest.is_some();
        let (manifest_name, version) = match manifest {
            Some(m) => (m.name, m.version),
            None => (None, None),
        };

        // 4. full replace, including copies of this identity under another name
        let (dest, stale) = match target {
            Target::Module => {
                let name = target_name(identity, has_manifest, manifest_name);
                let dest = parent.join(name);
                let stale = self.other_copies(identity, &dest)?;
                (dest, stale)
            }
            Target::Core => (self.config.core_dir(), Vec::new()),
        };
        for old in &stale {
            info!("Removing {:?}, superseded by {:?}", old.path, dest);
            runtime.remove_dir_all(&old.path)?;
        }
        if runtime.exists(&dest) {
            info!("Replacing existing {:?}", dest);
            runtime.remove_dir_all(&dest)?;
        }
        runtime.rename(&package_root, &dest)?;
        info!("Placed {} at {:?}", identity, dest);

        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| identity.to_string());

        // 5. register, keeping a disabled flag across a rename
        if let Target::Module = target {
            let statuses = self.registry.statuses()?;
            self.registry.discover()?;
            if stale.iter().any(|old| statuses.get(&old.name) == Some(&false)) {
                self.registry.set_enabled(&name, false)?;
            }
        }

        // 6. migrate
        if let Some(migrations) = self.migrator.pending(&dest) {
            info!("Applying migrations for {}", name);
            self.migrator
                .apply(&name, &migrations)
                .await
                .map_err(|e| LifecycleError::migration(identity, e))?;
        }

        Ok(InstalledInfo {
            identity: identity.to_string(),
            name,
            version: version
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOCAL_VERSION.to_string()),
            path: dest,
        })
    }
}

impl<R: Runtime> PackageInstaller<R> {
    /// Installed directories that resolve to `identity` but are not `dest`.
    fn other_copies(&self, identity: &str, dest: &Path) -> Result<Vec<LocalInfo>> {
        let reader = ManifestReader::new(
            self.runtime.clone(),
            self.config.modules_dir(),
            self.registry.clone(),
        );
        Ok(reader
            .list_installed()?
            .into_iter()
            .filter(|local| local.path != dest)
            .filter(|local| {
                match_kind(
                    identity,
                    local.alias.as_deref(),
                    &local.name,
                    &self.config.module_prefix,
                )
                .is_some()
            })
            .collect())
    }
}

/// Directory name for a module: the manifest `name` when it is a plain
/// directory name, the capitalised identity when the manifest has none, the
/// bare identity without a manifest.
fn target_name(identity: &str, has_manifest: bool, manifest_name: Option<String>) -> String {
    match manifest_name.filter(|n| is_plain_dir_name(n)) {
        Some(name) => name,
        None if has_manifest => capitalize(identity),
        None => identity.to_string(),
    }
}

/// The staging dir itself when it holds top-level files, else its newest subdirectory.
fn locate_package_root<R: Runtime + ?Sized>(runtime: &R, staging: &Path) -> Result<PathBuf> {
    let entries = runtime.read_dir(staging)?;
    if entries.is_empty() {
        bail!("Archive contained no files");
    }
    if entries.iter().any(|p| !runtime.is_dir(p)) {
        debug!("Archive has top-level files, using staging dir as package root");
        return Ok(staging.to_path_buf());
    }

    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for dir in entries {
        let modified = runtime.modified(&dir)?;
        if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
            newest = Some((modified, dir));
        }
    }
    match newest {
        Some((_, dir)) => Ok(dir),
        None => bail!("Archive contained no package directory"),
    }
}

fn is_plain_dir_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.starts_with('.')
}
