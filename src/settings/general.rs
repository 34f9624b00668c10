use anyhow::Result;
use serde_json::Value;

use super::tabs::{FieldKind, SettingsField, SettingsTab};
use super::SettingsStore;

pub const DEFAULT_NAME: &str = "Connexion";

const NAME: &str = "general.name";
const EMAIL: &str = "general.email";
const ABBREVIATION: &str = "general.abbreviation";

/// Settings of the `general` group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneralSettings {
    pub name: String,
    pub email: Option<String>,
    pub abbreviation: Option<String>,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            email: None,
            abbreviation: None,
        }
    }
}

fn string_setting(store: &dyn SettingsStore, key: &str) -> Result<Option<String>> {
    Ok(store
        .get(key)?
        .and_then(|v| v.as_str().map(str::to_string))
        .filter(|s| !s.trim().is_empty()))
}

impl GeneralSettings {
    pub fn load(store: &dyn SettingsStore) -> Result<Self> {
        Ok(Self {
            name: string_setting(store, NAME)?.unwrap_or_else(|| DEFAULT_NAME.to_string()),
            email: string_setting(store, EMAIL)?,
            abbreviation: string_setting(store, ABBREVIATION)?,
        })
    }

    /// Write every present value.
    pub fn save(&self, store: &dyn SettingsStore) -> Result<()> {
        store.set(NAME, Value::String(self.name.clone()))?;
        if let Some(email) = &self.email {
            store.set(EMAIL, Value::String(email.clone()))?;
        }
        if let Some(abbreviation) = &self.abbreviation {
            store.set(ABBREVIATION, Value::String(abbreviation.clone()))?;
        }
        Ok(())
    }

    /// Name the application presents itself under.
    pub fn app_name(&self) -> String {
        self.abbreviation
            .clone()
            .unwrap_or_else(|| self.name.clone())
    }
}

/// The built-in tab, always registered first.
pub struct GeneralSettingsTab;

impl SettingsTab for GeneralSettingsTab {
    fn id(&self) -> &str {
        "general"
    }

    fn label(&self) -> &str {
        "Core"
    }

    fn fields(&self) -> Vec<SettingsField> {
        vec![
            SettingsField::new(NAME, "Church Name", FieldKind::Required),
            SettingsField::new(EMAIL, "Church Email", FieldKind::Email),
            SettingsField::new(ABBREVIATION, "Abbreviation", FieldKind::Required),
        ]
    }
}
