//! Package management
//!
//! Local manifests, version ordering, reconciliation against remote releases,
//! and the install/activate transitions.

pub mod activator;
pub mod identity;
pub mod installer;
mod lock;
pub mod manifest;
pub mod reconcile;
pub mod version;

pub use activator::{Activation, PackageActivator};
pub use installer::{InstalledInfo, PackageInstaller};
pub use manifest::{LocalInfo, ManifestReader, ManifestSetting};
pub use reconcile::{PackageDescriptor, RemoteInfo, RemoteVersion, Status, reconcile};
pub use version::PackageVersion;
