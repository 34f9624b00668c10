use log::{info, warn};
use std::sync::Arc;

use crate::error::LifecycleError;
use crate::registry::ModuleRegistry;

use super::identity::match_kind;
use super::manifest::LocalInfo;

/// Result of an enable/disable request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub name: String,
    pub enabled: bool,
}

/// Toggles enabled flags. The core package cannot be disabled.
pub struct PackageActivator {
    registry: Arc<dyn ModuleRegistry>,
    core_identity: String,
    module_prefix: String,
}

impl PackageActivator {
    pub fn new(registry: Arc<dyn ModuleRegistry>, core_identity: &str, module_prefix: &str) -> Self {
        Self {
            registry,
            core_identity: core_identity.to_string(),
            module_prefix: module_prefix.to_string(),
        }
    }

    /// Local package answering to `identity`: alias match, then directory
    /// name, then directory name with the module prefix stripped.
    pub fn resolve<'a>(&self, identity: &str, installed: &'a [LocalInfo]) -> Option<&'a LocalInfo> {
        resolve(identity, installed, &self.module_prefix)
    }

    #[tracing::instrument(skip(self, installed))]
    pub fn set_enabled(
        &self,
        identity: &str,
        enabled: bool,
        installed: &[LocalInfo],
    ) -> Result<Activation, LifecycleError> {
        if identity == self.core_identity {
            if !enabled {
                warn!("Refusing to disable the core package");
                return Err(LifecycleError::Forbidden(
                    "the core package cannot be disabled".to_string(),
                ));
            }
            return Ok(Activation {
                name: identity.to_string(),
                enabled: true,
            });
        }

        let local = self
            .resolve(identity, installed)
            .ok_or_else(|| LifecycleError::NotFound(identity.to_string()))?;

        self.registry.set_enabled(&local.name, enabled)?;
        info!(
            "{} {}",
            local.name,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(Activation {
            name: local.name.clone(),
            enabled,
        })
    }
}

/// Shared by the activator and the reconciliation pass.
pub fn resolve<'a>(identity: &str, installed: &'a [LocalInfo], prefix: &str) -> Option<&'a LocalInfo> {
    installed
        .iter()
        .filter_map(|local| {
            match_kind(identity, local.alias.as_deref(), &local.name, prefix).map(|k| (k, local))
        })
        .min_by_key(|(kind, _)| *kind)
        .map(|(_, local)| local)
}
