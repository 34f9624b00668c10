//! Local package manifests (`module.json`).

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::registry::ModuleRegistry;
use crate::runtime::Runtime;

use super::identity::{capitalize, slugify};

pub const MANIFEST_FILE: &str = "module.json";
pub const DEFAULT_LOCAL_VERSION: &str = "dev";
pub const DEFAULT_CORE_VERSION: &str = "dev-local";

/// A settings field a package contributes to the settings screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSetting {
    pub key: String,
    pub label: String,
}

/// The consumed subset of `module.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub name: Option<String>,
    pub alias: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub settings: Vec<ManifestSetting>,
}

/// An installed package as seen on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalInfo {
    pub identity: String,
    /// Directory name, also the key in the enabled-flags file.
    pub name: String,
    pub alias: Option<String>,
    pub display_name: String,
    pub version: String,
    pub description: String,
    pub enabled: bool,
    pub path: PathBuf,
    pub settings: Vec<ManifestSetting>,
}

/// Read and parse `<dir>/module.json`. `Ok(None)` when the file is absent.
pub fn read_manifest<R: Runtime + ?Sized>(runtime: &R, dir: &Path) -> Result<Option<Manifest>> {
    let path = dir.join(MANIFEST_FILE);
    if !runtime.exists(&path) {
        return Ok(None);
    }
    let content = runtime.read_to_string(&path)?;
    let manifest = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse manifest {:?}", path))?;
    Ok(Some(manifest))
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

pub struct ManifestReader<R: Runtime> {
    runtime: Arc<R>,
    modules_dir: PathBuf,
    registry: Arc<dyn ModuleRegistry>,
}

impl<R: Runtime> ManifestReader<R> {
    pub fn new(runtime: Arc<R>, modules_dir: PathBuf, registry: Arc<dyn ModuleRegistry>) -> Self {
        Self {
            runtime,
            modules_dir,
            registry,
        }
    }

    /// Every package directory under the modules dir, in directory order.
    ///
    /// A missing or corrupt manifest yields defaults for that package only.
    #[tracing::instrument(skip(self))]
    pub fn list_installed(&self) -> Result<Vec<LocalInfo>> {
        if !self.runtime.exists(&self.modules_dir) {
            return Ok(Vec::new());
        }

        let statuses = self.registry.statuses().unwrap_or_else(|e| {
            warn!("Failed to read module statuses: {:#}", e);
            BTreeMap::new()
        });

        let mut installed = Vec::new();
        for path in self.runtime.read_dir(&self.modules_dir)? {
            let name = dir_name(&path);
            if name.starts_with('.') || !self.runtime.is_dir(&path) {
                continue;
            }
            let enabled = statuses.get(&name).copied().unwrap_or(false);
            installed.push(self.read_local(&path, name, enabled));
        }
        debug!("Found {} installed package(s)", installed.len());
        Ok(installed)
    }

    fn read_local(&self, path: &Path, name: String, enabled: bool) -> LocalInfo {
        let manifest = match read_manifest(self.runtime.as_ref(), path) {
            Ok(Some(m)) => m,
            Ok(None) => {
                warn!("Package {} has no {}, using defaults", name, MANIFEST_FILE);
                Manifest::default()
            }
            Err(e) => {
                warn!("Unreadable manifest for {}: {:#}", name, e);
                Manifest::default()
            }
        };

        let alias = non_empty(manifest.alias);
        LocalInfo {
            identity: slugify(alias.as_deref().unwrap_or(&name)),
            display_name: non_empty(manifest.name).unwrap_or_else(|| capitalize(&name)),
            version: non_empty(manifest.version)
                .unwrap_or_else(|| DEFAULT_LOCAL_VERSION.to_string()),
            description: manifest.description.unwrap_or_default(),
            alias,
            enabled,
            path: path.to_path_buf(),
            settings: manifest.settings,
            name,
        }
    }

    /// Read the core package. It is always installed and enabled.
    #[tracing::instrument(skip(self))]
    pub fn read_core(&self, dir: &Path, identity: &str) -> LocalInfo {
        let manifest = read_manifest(self.runtime.as_ref(), dir).unwrap_or_else(|e| {
            warn!("Unreadable core manifest: {:#}", e);
            None
        });
        let (display_name, description, settings, version) = match manifest {
            Some(m) => (non_empty(m.name), m.description, m.settings, non_empty(m.version)),
            None => (None, None, Vec::new(), None),
        };

        let version = version
            .or_else(|| self.composer_version(dir))
            .or_else(|| self.version_file(dir))
            .unwrap_or_else(|| DEFAULT_CORE_VERSION.to_string());

        LocalInfo {
            identity: identity.to_string(),
            name: dir_name(dir),
            alias: None,
            display_name: display_name.unwrap_or_else(|| "Core".to_string()),
            version,
            description: description.unwrap_or_default(),
            enabled: true,
            path: dir.to_path_buf(),
            settings,
        }
    }

    fn composer_version(&self, dir: &Path) -> Option<String> {
        let path = dir.join("composer.json");
        if !self.runtime.exists(&path) {
            return None;
        }
        let content = self.runtime.read_to_string(&path).ok()?;
        let value: serde_json::Value = serde_json::from_str(&content).ok()?;
        non_empty(value.get("version")?.as_str().map(String::from))
    }

    fn version_file(&self, dir: &Path) -> Option<String> {
        let path = dir.join("VERSION");
        if !self.runtime.exists(&path) {
            return None;
        }
        non_empty(
            self.runtime
                .read_to_string(&path)
                .ok()
                .map(|s| s.trim().to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MockModuleRegistry;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use std::fs;
    use tempfile::tempdir;

    fn registry_with(statuses: &[(&str, bool)]) -> Arc<dyn ModuleRegistry> {
        let map: BTreeMap<String, bool> = statuses
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        let mut registry = MockModuleRegistry::new();
        registry
            .expect_statuses()
            .returning(move || Ok(map.clone()));
        Arc::new(registry)
    }

    #[test]
    fn test_list_installed_reads_manifests() {
        let dir = tempdir().unwrap();
        let modules = dir.path().join("modules");
        fs::create_dir_all(modules.join("People")).unwrap();
        fs::write(
            modules.join("People/module.json"),
            r#"{"name":"People","alias":"people","version":"1.0.0","description":"Members",
               "settings":[{"key":"show_birthdays","label":"Show birthdays"}]}"#,
        )
        .unwrap();

        let reader = ManifestReader::new(
            Arc::new(RealRuntime),
            modules.clone(),
            registry_with(&[("People", true)]),
        );
        let installed = reader.list_installed().unwrap();

        assert_eq!(installed.len(), 1);
        let people = &installed[0];
        assert_eq!(people.identity, "people");
        assert_eq!(people.name, "People");
        assert_eq!(people.version, "1.0.0");
        assert_eq!(people.description, "Members");
        assert!(people.enabled);
        assert_eq!(people.settings.len(), 1);
        assert_eq!(people.path, modules.join("People"));
    }

    #[test_log::test]
    fn test_list_installed_bad_manifest_falls_back() {
        let dir = tempdir().unwrap();
        let modules = dir.path().join("modules");
        fs::create_dir_all(modules.join("property")).unwrap();
        fs::create_dir_all(modules.join("Worship")).unwrap();
        fs::write(modules.join("property/module.json"), "{ not json").unwrap();
        fs::write(
            modules.join("Worship/module.json"),
            r#"{"name":"Worship","version":"0.3.0"}"#,
        )
        .unwrap();

        let reader = ManifestReader::new(
            Arc::new(RealRuntime),
            modules,
            registry_with(&[("Worship", false)]),
        );
        let installed = reader.list_installed().unwrap();

        assert_eq!(installed.len(), 2);
        let property = installed.iter().find(|l| l.name == "property").unwrap();
        assert_eq!(property.display_name, "Property");
        assert_eq!(property.version, "dev");
        assert_eq!(property.description, "");
        assert!(!property.enabled);

        let worship = installed.iter().find(|l| l.name == "Worship").unwrap();
        assert_eq!(worship.version, "0.3.0");
        assert!(!worship.enabled);
    }

    #[test]
    fn test_list_installed_skips_hidden_and_files() {
        let dir = tempdir().unwrap();
        let modules = dir.path().join("modules");
        fs::create_dir_all(modules.join(".staging-connexion-people")).unwrap();
        fs::create_dir_all(&modules).unwrap();
        fs::write(modules.join("README.md"), "not a package").unwrap();

        let reader = ManifestReader::new(Arc::new(RealRuntime), modules, registry_with(&[]));
        assert!(reader.list_installed().unwrap().is_empty());
    }

    #[test]
    fn test_list_installed_missing_modules_dir() {
        let mut runtime = MockRuntime::new();
        let modules = PathBuf::from("/srv/modman/modules");
        runtime
            .expect_exists()
            .with(eq(modules.clone()))
            .returning(|_| false);

        let reader = ManifestReader::new(Arc::new(runtime), modules, Arc::new(MockModuleRegistry::new()));
        assert!(reader.list_installed().unwrap().is_empty());
    }

    #[test]
    fn test_read_core_version_sources() {
        let dir = tempdir().unwrap();
        let core = dir.path().join("core");
        fs::create_dir_all(&core).unwrap();
        let reader = ManifestReader::new(
            Arc::new(RealRuntime),
            dir.path().join("modules"),
            registry_with(&[]),
        );

        // nothing on disk
        let info = reader.read_core(&core, "connexion");
        assert_eq!(info.version, "dev-local");
        assert_eq!(info.display_name, "Core");
        assert!(info.enabled);

        fs::write(core.join("VERSION"), "1.4.0\n").unwrap();
        assert_eq!(reader.read_core(&core, "connexion").version, "1.4.0");

        fs::write(core.join("composer.json"), r#"{"version":"1.5.0"}"#).unwrap();
        assert_eq!(reader.read_core(&core, "connexion").version, "1.5.0");

        fs::write(core.join("module.json"), r#"{"version":"1.6.0"}"#).unwrap();
        assert_eq!(reader.read_core(&core, "connexion").version, "1.6.0");
    }
}
