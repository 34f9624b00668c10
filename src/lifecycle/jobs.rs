//! Out-of-band core update.
//!
//! `enqueue` returns as soon as the job is queued. A single worker task runs
//! jobs in order and reports each result to the notifier only; nothing flows
//! back to the caller that queued it.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::LifecycleError;
use crate::package::{InstalledInfo, PackageInstaller};
use crate::runtime::Runtime;

use super::notify::{Level, Notifier, send};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreUpdateJob {
    pub archive_url: String,
    pub version: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CoreUpdater: Send + Sync {
    async fn update_core(&self, job: &CoreUpdateJob) -> Result<InstalledInfo, LifecycleError>;
}

#[async_trait]
impl<R: Runtime + 'static> CoreUpdater for PackageInstaller<R> {
    async fn update_core(&self, job: &CoreUpdateJob) -> Result<InstalledInfo, LifecycleError> {
        self.install_core(&job.archive_url).await
    }
}

pub struct CoreUpdateQueue {
    sender: Option<mpsc::UnboundedSender<CoreUpdateJob>>,
    worker: Option<JoinHandle<()>>,
}

impl CoreUpdateQueue {
    /// Spawn the worker. Must be called from within a tokio runtime.
    pub fn start(updater: Arc<dyn CoreUpdater>, notifier: Arc<dyn Notifier>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<CoreUpdateJob>();

        let worker = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                info!("Running core update to {}...", job.version);
                match updater.update_core(&job).await {
                    Ok(installed) => {
                        info!("Core update completed ({:?})", installed.path);
                        send(
                            notifier.as_ref(),
                            Level::Success,
                            &format!("Core updated to {}", job.version),
                        );
                    }
                    Err(e) => {
                        error!("Core update failed: {}", e);
                        send(
                            notifier.as_ref(),
                            Level::Danger,
                            &format!("Core update failed: {}", e),
                        );
                    }
                }
            }
            debug!("Core update worker stopped");
        });

        Self {
            sender: Some(sender),
            worker: Some(worker),
        }
    }

    pub fn enqueue(&self, job: CoreUpdateJob) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| anyhow!("Core update queue is shut down"))?;
        sender
            .send(job)
            .map_err(|_| anyhow!("Core update worker is not running"))?;
        Ok(())
    }

    /// Stop accepting jobs and wait for the queued ones to finish.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            worker
                .await
                .map_err(|e| anyhow!("Core update worker ended abnormally: {}", e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::notify::MockNotifier;
    use std::path::PathBuf;

    fn job(version: &str) -> CoreUpdateJob {
        CoreUpdateJob {
            archive_url: format!("https://example.com/core-{}.zip", version),
            version: version.into(),
        }
    }

    #[tokio::test]
    async fn test_success_reported_to_notifier() {
        let mut updater = MockCoreUpdater::new();
        updater.expect_update_core().times(1).returning(|job| {
            Ok(InstalledInfo {
                identity: "connexion".into(),
                name: "core".into(),
                version: job.version.clone(),
                path: PathBuf::from("/srv/modman/core"),
            })
        });

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|level, message| *level == Level::Success && message == "Core updated to v2.0.0")
            .times(1)
            .returning(|_, _| Ok(()));

        let mut queue = CoreUpdateQueue::start(Arc::new(updater), Arc::new(notifier));
        queue.enqueue(job("v2.0.0")).unwrap();
        queue.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_reported_to_notifier() {
        let mut updater = MockCoreUpdater::new();
        updater
            .expect_update_core()
            .returning(|_| Err(LifecycleError::download("connexion", anyhow!("HTTP 502"))));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|level, message| *level == Level::Danger && message.contains("HTTP 502"))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut queue = CoreUpdateQueue::start(Arc::new(updater), Arc::new(notifier));
        queue.enqueue(job("v2.0.0")).unwrap();
        queue.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_jobs_run_in_order() {
        let mut seq = mockall::Sequence::new();
        let mut updater = MockCoreUpdater::new();
        for version in ["v2.0.0", "v2.0.1"] {
            updater
                .expect_update_core()
                .withf(move |job| job.version == version)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|job| {
                    Ok(InstalledInfo {
                        identity: "connexion".into(),
                        name: "core".into(),
                        version: job.version.clone(),
                        path: PathBuf::from("/srv/modman/core"),
                    })
                });
        }
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(2).returning(|_, _| Ok(()));

        let mut queue = CoreUpdateQueue::start(Arc::new(updater), Arc::new(notifier));
        queue.enqueue(job("v2.0.0")).unwrap();
        queue.enqueue(job("v2.0.1")).unwrap();
        queue.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_fails() {
        let mut queue = CoreUpdateQueue::start(
            Arc::new(MockCoreUpdater::new()),
            Arc::new(MockNotifier::new()),
        );
        queue.shutdown().await.unwrap();
        assert!(queue.enqueue(job("v2.0.0")).is_err());
    }
}
