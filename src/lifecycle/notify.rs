//! Notification side channel.
//!
//! Every lifecycle outcome, including results of queued jobs, is recorded
//! here; `modman notifications` shows them.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::UNIX_EPOCH;

use crate::runtime::Runtime;

/// Maximum notifications kept on disk; oldest are dropped first.
const MAX_KEPT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Warning,
    Danger,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Info => "info",
            Level::Success => "success",
            Level::Warning => "warning",
            Level::Danger => "danger",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: Level,
    pub message: String,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
}

#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, level: Level, message: &str) -> Result<()>;
    fn list(&self) -> Result<Vec<Notification>>;
    fn clear(&self) -> Result<()>;
}

/// Record a notification; a failing store is logged, never fatal.
pub fn send(notifier: &dyn Notifier, level: Level, message: &str) {
    if let Err(e) = notifier.notify(level, message) {
        warn!("Failed to record notification: {:#}", e);
    }
}

/// JSON-file backed notification store.
pub struct FileNotifier<R: Runtime> {
    runtime: Arc<R>,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl<R: Runtime> FileNotifier<R> {
    pub fn new(runtime: Arc<R>, path: PathBuf) -> Self {
        Self {
            runtime,
            path,
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<Vec<Notification>> {
        if !self.runtime.exists(&self.path) {
            return Ok(Vec::new());
        }
        let content = self.runtime.read_to_string(&self.path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse notifications {:?}", self.path))
    }

    fn save(&self, notifications: &[Notification]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            self.runtime.create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(notifications)?;
        self.runtime.write(&self.path, json.as_bytes())
    }
}

impl<R: Runtime> Notifier for FileNotifier<R> {
    fn notify(&self, level: Level, message: &str) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        debug!("[{}] {}", level, message);

        let mut notifications = self.load().unwrap_or_else(|e| {
            warn!("Discarding unreadable notifications: {:#}", e);
            Vec::new()
        });
        let created_at = self
            .runtime
            .now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        notifications.push(Notification {
            level,
            message: message.to_string(),
            created_at,
        });
        if notifications.len() > MAX_KEPT {
            let excess = notifications.len() - MAX_KEPT;
            notifications.drain(..excess);
        }
        self.save(&notifications)
    }

    fn list(&self) -> Result<Vec<Notification>> {
        self.load()
    }

    fn clear(&self) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.runtime.exists(&self.path) {
            self.runtime.remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_notify_and_list() {
        let dir = tempdir().unwrap();
        let notifier = FileNotifier::new(Arc::new(RealRuntime), dir.path().join("notifications.json"));

        notifier.notify(Level::Success, "People installed").unwrap();
        notifier.notify(Level::Danger, "Core update failed").unwrap();

        let all = notifier.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].level, Level::Success);
        assert_eq!(all[1].message, "Core update failed");
        assert!(all[1].created_at > 0);
    }

    #[test]
    fn test_clear() {
        let dir = tempdir().unwrap();
        let notifier = FileNotifier::new(Arc::new(RealRuntime), dir.path().join("notifications.json"));

        notifier.clear().unwrap();
        notifier.notify(Level::Info, "hello").unwrap();
        notifier.clear().unwrap();
        assert!(notifier.list().unwrap().is_empty());
    }

    #[test]
    fn test_keeps_bounded_history() {
        let dir = tempdir().unwrap();
        let notifier = FileNotifier::new(Arc::new(RealRuntime), dir.path().join("notifications.json"));

        for i in 0..(MAX_KEPT + 5) {
            notifier.notify(Level::Info, &format!("n{}", i)).unwrap();
        }
        let all = notifier.list().unwrap();
        assert_eq!(all.len(), MAX_KEPT);
        assert_eq!(all[0].message, "n5");
    }

    #[test]
    fn test_corrupt_store_is_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notifications.json");
        fs::write(&path, "garbage").unwrap();
        let notifier = FileNotifier::new(Arc::new(RealRuntime), path);

        notifier.notify(Level::Warning, "recovered").unwrap();
        assert_eq!(notifier.list().unwrap().len(), 1);
    }

    #[test]
    fn test_send_swallows_store_errors() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("read-only filesystem")));

        send(&notifier, Level::Info, "ignored");
    }
}
