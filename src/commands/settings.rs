use anyhow::Result;
use log::info;
use serde_json::Value;

use crate::{
    error::LifecycleError,
    runtime::Runtime,
    settings::{SettingsStore, SettingsTabRegistry},
};

use super::services::Services;

fn registry<R: Runtime + 'static>(services: &Services<R>) -> Result<SettingsTabRegistry> {
    Ok(SettingsTabRegistry::with_packages(&services.manager.installed()?))
}

/// Print the registered tabs with their fields and current values
pub fn tabs<R: Runtime + 'static>(services: &Services<R>) -> Result<()> {
    let tabs = registry(services)?;
    print!("{}", render_tabs(&tabs, services.settings.as_ref())?);
    Ok(())
}

pub fn get<R: Runtime + 'static>(services: &Services<R>, key: &str) -> Result<()> {
    let tabs = registry(services)?;
    let value = read_value(&tabs, services.settings.as_ref(), key)?;
    println!("{}", display_value(value.as_ref()));
    Ok(())
}

pub fn set<R: Runtime + 'static>(services: &Services<R>, key: &str, raw: &str) -> Result<()> {
    let tabs = registry(services)?;
    let value = write_value(&tabs, services.settings.as_ref(), key, raw)?;
    println!("{} = {}", key, display_value(Some(&value)));
    Ok(())
}

pub(crate) fn read_value(
    tabs: &SettingsTabRegistry,
    store: &dyn SettingsStore,
    key: &str,
) -> Result<Option<Value>, LifecycleError> {
    if tabs.find_field(key).is_none() {
        return Err(LifecycleError::NotFound(key.to_string()));
    }
    Ok(store.get(key)?)
}

/// Validate `raw` against the field registered for `key`, then store it.
///
/// `raw` is parsed as JSON when it can be, so `true` or `3` keep their type;
/// anything else is stored as a string.
pub(crate) fn write_value(
    tabs: &SettingsTabRegistry,
    store: &dyn SettingsStore,
    key: &str,
    raw: &str,
) -> Result<Value, LifecycleError> {
    let field = tabs
        .find_field(key)
        .ok_or_else(|| LifecycleError::NotFound(key.to_string()))?;

    let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    field.validate(&value)?;
    store.set(key, value.clone())?;
    info!("Setting {} updated", key);
    Ok(value)
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "(not set)".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub(crate) fn render_tabs(tabs: &SettingsTabRegistry, store: &dyn SettingsStore) -> Result<String> {
    let mut out = String::new();
    for tab in tabs.tabs() {
        out.push_str(&format!("[{}] {}\n", tab.id(), tab.label()));
        for field in tab.fields() {
            let value = store.get(&field.key)?;
            out.push_str(&format!(
                "  {} ({}): {}\n",
                field.key,
                field.label,
                display_value(value.as_ref())
            ));
        }
    }
    Ok(out)
}
