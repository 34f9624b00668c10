//! Package registry: which module directories exist and which are enabled.
//!
//! Enabled flags persist in `modules_statuses.json` as `{ "<Name>": bool }`,
//! keyed by module directory name.

pub mod migrate;

use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::runtime::Runtime;

pub use migrate::{CommandMigrator, Migrator};

#[cfg(test)]
pub use migrate::MockMigrator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredModule {
    pub name: String,
    pub path: PathBuf,
    pub enabled: bool,
}

#[cfg_attr(test, mockall::automock)]
pub trait ModuleRegistry: Send + Sync {
    /// Scan the modules directory and register new modules as enabled.
    /// Flags of already known modules are preserved.
    fn discover(&self) -> Result<Vec<RegisteredModule>>;

    /// Current enabled flags by module name.
    fn statuses(&self) -> Result<BTreeMap<String, bool>>;

    /// Flip the enabled flag of a registered module.
    fn set_enabled(&self, name: &str, enabled: bool) -> Result<()>;
}

/// Registry backed by a JSON statuses file next to the modules directory.
pub struct FileRegistry<R: Runtime> {
    runtime: Arc<R>,
    modules_dir: PathBuf,
    statuses_path: PathBuf,
    // serializes read-modify-write of the statuses file within this process
    write_lock: Mutex<()>,
}

impl<R: Runtime> FileRegistry<R> {
    pub fn new(runtime: Arc<R>, modules_dir: PathBuf, statuses_path: PathBuf) -> Self {
        Self {
            runtime,
            modules_dir,
            statuses_path,
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<BTreeMap<String, bool>> {
        if !self.runtime.exists(&self.statuses_path) {
            return Ok(BTreeMap::new());
        }
        let content = self.runtime.read_to_string(&self.statuses_path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", self.statuses_path))
    }

    fn save(&self, statuses: &BTreeMap<String, bool>) -> Result<()> {
        if let Some(parent) = self.statuses_path.parent() {
            self.runtime.create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(statuses)?;
        let tmp = self.statuses_path.with_extension("json.tmp");
        self.runtime.write(&tmp, json.as_bytes())?;
        self.runtime.rename(&tmp, &self.statuses_path)?;
        Ok(())
    }

    fn module_dirs(&self) -> Result<Vec<PathBuf>> {
        if !self.runtime.exists(&self.modules_dir) {
            return Ok(Vec::new());
        }
        Ok(self
            .runtime
            .read_dir(&self.modules_dir)?
            .into_iter()
            .filter(|p| self.runtime.is_dir(p) && !is_hidden(p))
            .collect())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with('.'))
}

impl<R: Runtime> ModuleRegistry for FileRegistry<R> {
    #[tracing::instrument(skip(self))]
    fn discover(&self) -> Result<Vec<RegisteredModule>> {
        let _guard = self.lock();
        let mut statuses = self.load()?;
        let mut changed = false;
        let mut modules = Vec::new();

        for path in self.module_dirs()? {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let enabled = *statuses.entry(name.clone()).or_insert_with(|| {
                info!("Registered new module {}", name);
                changed = true;
                true
            });
            modules.push(RegisteredModule {
                name,
                path,
                enabled,
            });
        }

        if changed {
            self.save(&statuses)?;
        }
        debug!("Discovered {} module(s)", modules.len());
        Ok(modules)
    }

    fn statuses(&self) -> Result<BTreeMap<String, bool>> {
        self.load()
    }

    #[tracing::instrument(skip(self))]
    fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let _guard = self.lock();
        let mut statuses = self.load()?;
        statuses.insert(name.to_string(), enabled);
        self.save(&statuses)?;
        info!(
            "Module {} {}",
            name,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }
}
