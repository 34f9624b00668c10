use log::{debug, warn};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// RAII guard for a scratch file or directory.
///
/// The path is removed when the guard is dropped, whichever way the
/// enclosing operation exits. A path that no longer exists (e.g. because it
/// was renamed into its final place) is left alone.
pub struct TempPath<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
}

impl<'a, R: Runtime> TempPath<'a, R> {
    /// Register `path` for removal. Nothing is created.
    pub fn new(runtime: &'a R, path: PathBuf) -> Self {
        debug!("Tracking scratch path {:?}", path);
        Self { runtime, path }
    }

    /// Register a scratch directory, clearing any leftover from an earlier run.
    pub fn fresh_dir(runtime: &'a R, path: PathBuf) -> anyhow::Result<Self> {
        let guard = Self::new(runtime, path);
        if guard.runtime.exists(&guard.path) {
            guard.runtime.remove_dir_all(&guard.path)?;
        }
        guard.runtime.create_dir_all(&guard.path)?;
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<R: Runtime> Drop for TempPath<'_, R> {
    fn drop(&mut self) {
        if !self.runtime.exists(&self.path) {
            return;
        }
        debug!("Cleaning up: {:?}", self.path);
        let result = if self.runtime.is_dir(&self.path) {
            self.runtime.remove_dir_all(&self.path)
        } else {
            self.runtime.remove_file(&self.path)
        };
        if let Err(e) = result {
            warn!("Failed to clean up {:?}: {:#}", self.path, e);
        }
    }
}
