//! Status reconciliation: remote release data + local manifest -> descriptor.
//!
//! Everything here is pure; the orchestrator gathers the inputs.

use serde::Serialize;
use std::fmt;

use crate::config::TrackedPackage;
use crate::package::manifest::LocalInfo;
use crate::package::version::is_newer;

pub const NO_RELEASE_FOUND: &str = "No release found";
pub const NO_DESCRIPTION: &str = "No description provided";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NotInstalled,
    Installed,
    UpdateAvailable,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::NotInstalled => "not_installed",
            Status::Installed => "installed",
            Status::UpdateAvailable => "update_available",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "tag", rename_all = "snake_case")]
pub enum RemoteVersion {
    Known(String),
    Unknown,
}

impl RemoteVersion {
    pub fn as_known(&self) -> Option<&str> {
        match self {
            RemoteVersion::Known(tag) => Some(tag),
            RemoteVersion::Unknown => None,
        }
    }
}

impl fmt::Display for RemoteVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteVersion::Known(tag) => f.write_str(tag),
            RemoteVersion::Unknown => f.write_str("unknown"),
        }
    }
}

/// What the release source said about a package.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteInfo {
    pub version: RemoteVersion,
    pub display_name: String,
    pub description: String,
    pub download_url: Option<String>,
}

impl RemoteInfo {
    pub fn unavailable(display_name: String) -> Self {
        Self {
            version: RemoteVersion::Unknown,
            display_name,
            description: NO_RELEASE_FOUND.to_string(),
            download_url: None,
        }
    }
}

/// Unified view of one tracked package. Rebuilt on every pass, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageDescriptor {
    pub identity: String,
    pub repo: String,
    pub display_name: String,
    pub description: String,
    pub remote_version: RemoteVersion,
    pub local_version: Option<String>,
    pub download_url: Option<String>,
    pub is_core: bool,
    pub installed: bool,
    pub enabled: bool,
    pub status: Status,
}

impl PackageDescriptor {
    /// For the core package: a newer release exists (acted on via `update-core`).
    pub fn core_update_available(&self) -> bool {
        self.is_core && self.remote_is_newer()
    }

    fn remote_is_newer(&self) -> bool {
        match (self.remote_version.as_known(), self.local_version.as_deref()) {
            (Some(remote), Some(local)) => is_newer(remote, local),
            _ => false,
        }
    }
}

fn status_for(remote: &RemoteVersion, local: Option<&LocalInfo>) -> Status {
    let Some(local) = local else {
        return Status::NotInstalled;
    };
    match remote {
        RemoteVersion::Unknown => Status::Installed,
        RemoteVersion::Known(tag) if is_newer(tag, &local.version) => Status::UpdateAvailable,
        RemoteVersion::Known(_) => Status::Installed,
    }
}

/// Merge remote and local data for one tracked package.
pub fn reconcile(
    tracked: &TrackedPackage,
    remote: &RemoteInfo,
    local: Option<&LocalInfo>,
) -> PackageDescriptor {
    let (status, enabled) = if tracked.is_core {
        (Status::Installed, true)
    } else {
        (
            status_for(&remote.version, local),
            local.is_some_and(|l| l.enabled),
        )
    };

    let display_name = local
        .map(|l| l.display_name.clone())
        .unwrap_or_else(|| remote.display_name.clone());
    let description = local
        .map(|l| l.description.clone())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| remote.description.clone());

    PackageDescriptor {
        identity: tracked.identity.clone(),
        repo: tracked.repo.repo.clone(),
        display_name,
        description,
        remote_version: remote.version.clone(),
        local_version: local.map(|l| l.version.clone()),
        download_url: remote.download_url.clone(),
        is_core: tracked.is_core,
        installed: tracked.is_core || local.is_some(),
        enabled,
        status,
    }
}
