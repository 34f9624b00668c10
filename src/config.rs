//! Process-wide configuration.
//!
//! Built once in `main` from CLI flags, the optional `<root>/modman.json` file
//! and the persisted general settings, then shared read-only.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use reqwest::{
    Client,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::archive::ArchiveFormat;
use crate::http::HttpClient;
use crate::package::identity::slugify;
use crate::runtime::Runtime;
use crate::settings::{GeneralSettings, SettingsStore};
use crate::source::RepoId;

pub const CONFIG_FILE: &str = "modman.json";
pub const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_OWNER: &str = "light-worx";
const DEFAULT_CORE_REPO: &str = "connexion";
const DEFAULT_MODULE_PREFIX: &str = "connexion-";
const DEFAULT_REPOS: &[&str] = &[
    "connexion-people",
    "connexion-property",
    "connexion-worship",
];
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Optional on-disk overrides (`modman.json`).
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    api_url: Option<String>,
    owner: Option<String>,
    core_repo: Option<String>,
    repos: Option<Vec<String>>,
    module_prefix: Option<String>,
    archive_format: Option<ArchiveFormat>,
    http_timeout_secs: Option<u64>,
    migrate_command: Option<Vec<String>>,
}

/// One package the manager keeps track of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedPackage {
    pub identity: String,
    pub repo: RepoId,
    pub is_core: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub api_url: String,
    pub token: Option<String>,
    pub owner: String,
    pub core_repo: String,
    pub repos: Vec<String>,
    pub module_prefix: String,
    pub archive_format: ArchiveFormat,
    pub http_timeout: Duration,
    /// Argument vector run to apply migrations; `{path}` and `{package}` are substituted.
    pub migrate_command: Vec<String>,
    pub app_name: String,
}

impl Config {
    /// Build the configuration for `root`.
    ///
    /// Precedence: CLI flag, then `modman.json`, then built-in defaults.
    #[tracing::instrument(skip(runtime, settings))]
    pub fn load<R: Runtime>(
        runtime: &R,
        root: PathBuf,
        api_url: Option<String>,
        settings: &dyn SettingsStore,
    ) -> Result<Self> {
        let file = read_file_config(runtime, &root.join(CONFIG_FILE))?;
        let token = runtime
            .env_var("GITHUB_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        let app_name = GeneralSettings::load(settings)?.app_name();
        let core_repo = file
            .core_repo
            .unwrap_or_else(|| DEFAULT_CORE_REPO.to_string());
        let repos = unique_repos(
            &slugify(&core_repo),
            file.repos
                .unwrap_or_else(|| DEFAULT_REPOS.iter().map(|s| s.to_string()).collect()),
        );

        let config = Self {
            api_url: api_url
                .or(file.api_url)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            token,
            owner: file.owner.unwrap_or_else(|| DEFAULT_OWNER.to_string()),
            core_repo,
            repos,
            module_prefix: file
                .module_prefix
                .unwrap_or_else(|| DEFAULT_MODULE_PREFIX.to_string()),
            archive_format: file.archive_format.unwrap_or_default(),
            http_timeout: Duration::from_secs(
                file.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            ),
            migrate_command: file.migrate_command.unwrap_or_default(),
            app_name,
            root,
        };
        info!("Using root: {}", config.root.display());
        Ok(config)
    }

    /// Core package first, then the module repos in configured order.
    pub fn tracked(&self) -> Vec<TrackedPackage> {
        let core = TrackedPackage {
            identity: self.core_identity(),
            repo: RepoId::new(&self.owner, &self.core_repo),
            is_core: true,
        };
        std::iter::once(core)
            .chain(self.repos.iter().map(|repo| TrackedPackage {
                identity: slugify(repo),
                repo: RepoId::new(&self.owner, repo),
                is_core: false,
            }))
            .collect()
    }

    pub fn core_identity(&self) -> String {
        slugify(&self.core_repo)
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.root.join("modules")
    }

    pub fn statuses_path(&self) -> PathBuf {
        self.root.join("modules_statuses.json")
    }

    pub fn core_dir(&self) -> PathBuf {
        self.root.join("core")
    }

    pub fn installed_marker(&self) -> PathBuf {
        self.root.join("installed.lock")
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.root.join(".locks")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    pub fn notifications_path(&self) -> PathBuf {
        self.root.join("notifications.json")
    }
}

/// Settings live next to the config file but are needed before `Config` exists.
pub fn settings_path(root: &Path) -> PathBuf {
    root.join("settings.json")
}

/// Resolve the root directory: explicit flag/env, else `~/.modman`.
#[tracing::instrument(skip(runtime))]
pub fn resolve_root<R: Runtime>(runtime: &R, root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(path) => Ok(path),
        None => default_root(runtime),
    }
}

#[tracing::instrument(skip(runtime))]
pub fn default_root<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    let home_dir = runtime
        .home_dir()
        .context("Could not find home directory")?;
    Ok(home_dir.join(".modman"))
}

/// Drop repos whose identity collides with the core or an earlier repo, so
/// every identity is tracked once.
fn unique_repos(core_identity: &str, repos: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::from([core_identity.to_string()]);
    repos
        .into_iter()
        .filter(|repo| {
            let fresh = seen.insert(slugify(repo));
            if !fresh {
                warn!("Ignoring repo {}: its identity is already tracked", repo);
            }
            fresh
        })
        .collect()
}

fn read_file_config<R: Runtime>(runtime: &R, path: &Path) -> Result<FileConfig> {
    if !runtime.exists(path) {
        debug!("No config file at {:?}, using defaults", path);
        return Ok(FileConfig::default());
    }
    let content = runtime.read_to_string(path)?;
    serde_json::from_str(&content).with_context(|| format!("Invalid config file {:?}", path))
}

/// Build the HTTP client shared by the release source and the downloader.
pub fn build_http_client(config: &Config) -> Result<HttpClient> {
    let mut headers = HeaderMap::new();

    if let Some(token) = config.token.as_deref() {
        let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);
        debug!("HTTP client configured with authentication");
    }

    let client = Client::builder()
        .user_agent(concat!("modman/", env!("MODMAN_VERSION")))
        .default_headers(headers)
        .timeout(config.http_timeout)
        .build()?;

    Ok(HttpClient::new(client))
}
