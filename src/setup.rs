//! One-time setup, gated by the `installed.lock` marker.

use log::info;
use std::time::UNIX_EPOCH;

use crate::config::Config;
use crate::error::LifecycleError;
use crate::lifecycle::{Action, LifecycleManager};
use crate::runtime::Runtime;
use crate::settings::{GeneralSettings, GeneralSettingsTab, SettingsStore, SettingsTab};

#[derive(Debug, Clone, Default)]
pub struct SetupOptions {
    pub name: Option<String>,
    pub email: Option<String>,
    pub abbreviation: Option<String>,
    /// Identities of the modules to install right away.
    pub modules: Vec<String>,
}

#[derive(Debug)]
pub struct SetupReport {
    pub settings: GeneralSettings,
    pub installed: Vec<String>,
}

pub fn is_installed<R: Runtime + ?Sized>(runtime: &R, config: &Config) -> bool {
    runtime.exists(&config.installed_marker())
}

/// Gate for every command except `setup`.
pub fn require_installed<R: Runtime + ?Sized>(
    runtime: &R,
    config: &Config,
) -> Result<(), LifecycleError> {
    if is_installed(runtime, config) {
        Ok(())
    } else {
        Err(LifecycleError::SetupRequired)
    }
}

/// Save general settings, install the chosen modules, then write the marker.
///
/// The marker is written last, so a failed setup can be run again.
#[tracing::instrument(skip(runtime, config, store, manager))]
pub async fn run_setup<R: Runtime + 'static>(
    runtime: &R,
    config: &Config,
    store: &dyn SettingsStore,
    manager: &LifecycleManager<R>,
    options: SetupOptions,
) -> Result<SetupReport, LifecycleError> {
    if is_installed(runtime, config) {
        return Err(LifecycleError::Forbidden(
            "setup has already been completed".to_string(),
        ));
    }

    let current = GeneralSettings::load(store)?;
    let settings = GeneralSettings {
        name: options.name.unwrap_or(current.name),
        email: options.email.or(current.email),
        abbreviation: options.abbreviation.or(current.abbreviation),
    };
    validate(&settings)?;

    runtime.create_dir_all(&config.modules_dir())?;
    settings.save(store)?;

    let mut installed = Vec::new();
    for identity in &options.modules {
        info!("Installing {} during setup", identity);
        manager.act(identity, Action::Install).await?;
        installed.push(identity.clone());
    }

    let marker = config.installed_marker();
    if !runtime.create_new(&marker)? {
        return Err(LifecycleError::Forbidden(
            "setup has already been completed".to_string(),
        ));
    }
    let stamp = runtime
        .now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    runtime.write(&marker, stamp.to_string().as_bytes())?;
    info!("Setup complete");

    Ok(SetupReport {
        settings,
        installed,
    })
}

fn validate(settings: &GeneralSettings) -> anyhow::Result<()> {
    let values = [
        serde_json::json!(settings.name),
        serde_json::json!(settings.email.clone().unwrap_or_default()),
        serde_json::json!(settings.abbreviation.clone().unwrap_or_default()),
    ];
    for (field, value) in GeneralSettingsTab.fields().iter().zip(values.iter()) {
        field.validate(value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use crate::settings::JsonSettingsStore;
    use crate::test_utils::{test_config, test_manager};
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_require_installed() {
        let config = test_config(std::path::Path::new("/srv/modman"));
        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);

        let err = require_installed(&runtime, &config).unwrap_err();
        assert_eq!(err.code(), "setup_required");
        assert_eq!(err.exit_code(), 8);
    }

    #[tokio::test]
    async fn test_setup_writes_settings_and_marker_once() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let store = JsonSettingsStore::new(Arc::new(RealRuntime), dir.path().join("settings.json"));
        let mut manager = test_manager(dir.path());

        let report = run_setup(
            &RealRuntime,
            &config,
            &store,
            &manager,
            SetupOptions {
                name: Some("Grace Church".into()),
                email: Some("office@grace.org".into()),
                abbreviation: Some("GC".into()),
                modules: vec![],
            },
        )
        .await
        .unwrap();

        assert_eq!(report.settings.app_name(), "GC");
        assert!(dir.path().join("installed.lock").exists());
        assert!(require_installed(&RealRuntime, &config).is_ok());
        assert_eq!(
            GeneralSettings::load(&store).unwrap().email.as_deref(),
            Some("office@grace.org")
        );

        let again = run_setup(&RealRuntime, &config, &store, &manager, SetupOptions::default())
            .await
            .unwrap_err();
        assert_eq!(again.code(), "forbidden");
        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_setup_rejects_missing_abbreviation() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let store = JsonSettingsStore::new(Arc::new(RealRuntime), dir.path().join("settings.json"));
        let manager = test_manager(dir.path());

        let err = run_setup(
            &RealRuntime,
            &config,
            &store,
            &manager,
            SetupOptions {
                name: Some("Grace Church".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("Abbreviation is required"));
        assert!(!dir.path().join("installed.lock").exists());
    }

    #[tokio::test]
    async fn test_failed_module_install_leaves_setup_open() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let store = JsonSettingsStore::new(Arc::new(RealRuntime), dir.path().join("settings.json"));
        // every release lookup fails in the test manager
        let manager = test_manager(dir.path());

        let err = run_setup(
            &RealRuntime,
            &config,
            &store,
            &manager,
            SetupOptions {
                abbreviation: Some("GC".into()),
                modules: vec!["connexion-people".into()],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.code(), "download_failed");
        assert!(!dir.path().join("installed.lock").exists());
        assert!(fs::read_to_string(dir.path().join("settings.json")).is_ok());
    }
}
