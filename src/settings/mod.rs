//! Application settings: a key/value store plus the tabs that expose keys.
//!
//! Keys are dotted, `<tab>.<field>` (e.g. `general.name`).

mod general;
mod tabs;

use anyhow::{Context, Result};
use log::debug;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::runtime::Runtime;

pub use general::{GeneralSettings, GeneralSettingsTab};
pub use tabs::{FieldKind, ManifestSettingsTab, SettingsField, SettingsTab, SettingsTabRegistry};

#[cfg_attr(test, mockall::automock)]
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// Settings persisted as one flat JSON object.
pub struct JsonSettingsStore<R: Runtime> {
    runtime: Arc<R>,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl<R: Runtime> JsonSettingsStore<R> {
    pub fn new(runtime: Arc<R>, path: PathBuf) -> Self {
        Self {
            runtime,
            path,
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<Map<String, Value>> {
        if !self.runtime.exists(&self.path) {
            return Ok(Map::new());
        }
        let content = self.runtime.read_to_string(&self.path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings {:?}", self.path))
    }
}

impl<R: Runtime> SettingsStore for JsonSettingsStore<R> {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.load()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut all = self.load()?;
        debug!("Setting {} = {}", key, value);
        all.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent() {
            self.runtime.create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&all)?;
        self.runtime.write(&self.path, json.as_bytes())
    }
}
