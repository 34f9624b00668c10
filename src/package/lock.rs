use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::error::LifecycleError;
use crate::runtime::Runtime;

/// Per-identity install lock: `<locks_dir>/<identity>.lock`.
///
/// Created with create-new semantics, so it excludes concurrent installs in
/// other tasks and other processes alike. Removed on drop.
pub struct InstallLock<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
}

impl<'a, R: Runtime> InstallLock<'a, R> {
    pub fn acquire(
        runtime: &'a R,
        locks_dir: &Path,
        identity: &str,
    ) -> Result<Self, LifecycleError> {
        runtime.create_dir_all(locks_dir)?;
        let path = locks_dir.join(format!("{}.lock", identity));
        if !runtime.create_new(&path)? {
            return Err(LifecycleError::Busy(identity.to_string()));
        }
        debug!("Acquired install lock {:?}", path);
        Ok(Self { runtime, path })
    }
}

impl<R: Runtime> Drop for InstallLock<'_, R> {
    fn drop(&mut self) {
        if let Err(e) = self.runtime.remove_file(&self.path) {
            warn!("Failed to release install lock {:?}: {:#}", self.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use tempfile::tempdir;

    #[test]
    fn test_lock_excludes_second_holder() {
        let dir = tempdir().unwrap();
        let locks = dir.path().join(".locks");

        let first = InstallLock::acquire(&RealRuntime, &locks, "connexion-people").unwrap();
        let second = InstallLock::acquire(&RealRuntime, &locks, "connexion-people");
        assert!(matches!(second, Err(LifecycleError::Busy(id)) if id == "connexion-people"));

        // other identities are independent
        let _other = InstallLock::acquire(&RealRuntime, &locks, "connexion-worship").unwrap();

        drop(first);
        assert!(!locks.join("connexion-people.lock").exists());
        assert!(InstallLock::acquire(&RealRuntime, &locks, "connexion-people").is_ok());
    }

    #[test]
    fn test_lock_release_failure_is_not_fatal() {
        let mut runtime = MockRuntime::new();
        let locks = PathBuf::from("/srv/modman/.locks");
        let lock_path = locks.join("connexion-people.lock");

        runtime.expect_create_dir_all().returning(|_| Ok(()));
        runtime
            .expect_create_new()
            .with(eq(lock_path.clone()))
            .returning(|_| Ok(true));
        runtime
            .expect_remove_file()
            .with(eq(lock_path))
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("permission denied")));

        let lock = InstallLock::acquire(&runtime, &locks, "connexion-people").unwrap();
        drop(lock);
    }
}
