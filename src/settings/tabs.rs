//! Settings tabs and their explicit registry.

use anyhow::{Result, bail};
use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::package::{LocalInfo, ManifestSetting};

use super::general::GeneralSettingsTab;

/// Input validation applied when a field is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Required,
    Email,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsField {
    pub key: String,
    pub label: String,
    pub kind: FieldKind,
}

impl SettingsField {
    pub fn new(key: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            kind,
        }
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        let text = value.as_str().unwrap_or_default().trim();
        match self.kind {
            FieldKind::Text => {}
            FieldKind::Required if text.is_empty() && !value.is_boolean() && !value.is_number() => {
                bail!("{} is required", self.label)
            }
            FieldKind::Email if !text.is_empty() && !looks_like_email(text) => {
                bail!("{} must be an email address", self.label)
            }
            _ => {}
        }
        Ok(())
    }
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

pub trait SettingsTab: Send + Sync {
    fn id(&self) -> &str;
    fn label(&self) -> &str;
    fn fields(&self) -> Vec<SettingsField>;
}

/// Tab contributed by a package through the `settings` list of its manifest.
pub struct ManifestSettingsTab {
    id: String,
    label: String,
    settings: Vec<ManifestSetting>,
}

impl ManifestSettingsTab {
    pub fn from_local(local: &LocalInfo) -> Option<Self> {
        if local.settings.is_empty() {
            return None;
        }
        Some(Self {
            id: local.identity.clone(),
            label: local.display_name.clone(),
            settings: local.settings.clone(),
        })
    }
}

impl SettingsTab for ManifestSettingsTab {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn fields(&self) -> Vec<SettingsField> {
        self.settings
            .iter()
            .map(|s| SettingsField::new(&format!("{}.{}", self.id, s.key), &s.label, FieldKind::Text))
            .collect()
    }
}

#[derive(Default)]
pub struct SettingsTabRegistry {
    tabs: Vec<Box<dyn SettingsTab>>,
}

impl SettingsTabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// General tab first, then one tab per enabled package that declares settings.
    pub fn with_packages(installed: &[LocalInfo]) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(GeneralSettingsTab));
        for local in installed.iter().filter(|l| l.enabled) {
            if let Some(tab) = ManifestSettingsTab::from_local(local) {
                registry.register(Box::new(tab));
            }
        }
        registry
    }

    pub fn register(&mut self, tab: Box<dyn SettingsTab>) {
        if self.tabs.iter().any(|t| t.id() == tab.id()) {
            debug!("Settings tab {} already registered, ignoring", tab.id());
            return;
        }
        debug!("Registered settings tab {}", tab.id());
        self.tabs.push(tab);
    }

    pub fn tabs(&self) -> &[Box<dyn SettingsTab>] {
        &self.tabs
    }

    pub fn find_field(&self, key: &str) -> Option<SettingsField> {
        self.tabs
            .iter()
            .flat_map(|t| t.fields())
            .find(|f| f.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn local(name: &str, enabled: bool, settings: &[(&str, &str)]) -> LocalInfo {
        LocalInfo {
            identity: name.to_lowercase(),
            name: name.into(),
            alias: None,
            display_name: name.into(),
            version: "1.0.0".into(),
            description: String::new(),
            enabled,
            path: PathBuf::from("/srv/modman/modules").join(name),
            settings: settings
                .iter()
                .map(|(k, l)| ManifestSetting {
                    key: k.to_string(),
                    label: l.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_registry_general_first_then_enabled_packages() {
        let installed = vec![
            local("People", true, &[("show_birthdays", "Show birthdays")]),
            local("Worship", false, &[("default_key", "Default key")]),
            local("Property", true, &[]),
        ];

        let registry = SettingsTabRegistry::with_packages(&installed);
        let ids: Vec<_> = registry.tabs().iter().map(|t| t.id().to_string()).collect();
        assert_eq!(ids, vec!["general", "people"]);
        assert_eq!(registry.tabs()[0].label(), "Core");
    }

    #[test]
    fn test_find_field() {
        let installed = vec![local("People", true, &[("show_birthdays", "Show birthdays")])];
        let registry = SettingsTabRegistry::with_packages(&installed);

        assert_eq!(
            registry.find_field("people.show_birthdays").unwrap().label,
            "Show birthdays"
        );
        assert_eq!(
            registry.find_field("general.email").unwrap().kind,
            FieldKind::Email
        );
        assert!(registry.find_field("worship.default_key").is_none());
    }

    #[test]
    fn test_duplicate_tab_ignored() {
        let mut registry = SettingsTabRegistry::new();
        registry.register(Box::new(GeneralSettingsTab));
        registry.register(Box::new(GeneralSettingsTab));
        assert_eq!(registry.tabs().len(), 1);
    }

    #[test]
    fn test_validate() {
        let required = SettingsField::new("general.name", "Church Name", FieldKind::Required);
        assert!(required.validate(&json!("Grace")).is_ok());
        assert!(required.validate(&json!("  ")).is_err());

        let email = SettingsField::new("general.email", "Church Email", FieldKind::Email);
        assert!(email.validate(&json!("office@grace.org")).is_ok());
        assert!(email.validate(&json!("")).is_ok());
        assert!(email.validate(&json!("office")).is_err());
        assert!(email.validate(&json!("office@localhost")).is_err());

        let text = SettingsField::new("people.x", "X", FieldKind::Text);
        assert!(text.validate(&json!(true)).is_ok());
    }
}
