//! Schema migrations, applied through an external command.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

use crate::runtime::Runtime;

const MIGRATION_DIRS: &[&str] = &["database/migrations", "Database/Migrations"];

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Migrator: Send + Sync {
    /// The package's migrations directory, if it ships any migration.
    fn pending(&self, package_path: &Path) -> Option<PathBuf>;

    /// Apply migrations for `package` in forced, non-interactive mode.
    async fn apply(&self, package: &str, migrations_dir: &Path) -> Result<()>;
}

/// Runs the configured migrate command, e.g.
/// `["php", "artisan", "migrate", "--path={path}", "--force"]`.
pub struct CommandMigrator<R: Runtime> {
    runtime: Arc<R>,
    command: Vec<String>,
    workdir: PathBuf,
}

impl<R: Runtime> CommandMigrator<R> {
    pub fn new(runtime: Arc<R>, command: Vec<String>, workdir: PathBuf) -> Self {
        Self {
            runtime,
            command,
            workdir,
        }
    }
}

fn render(arg: &str, package: &str, migrations_dir: &Path) -> String {
    arg.replace("{path}", &migrations_dir.to_string_lossy())
        .replace("{package}", package)
}

#[async_trait]
impl<R: Runtime> Migrator for CommandMigrator<R> {
    fn pending(&self, package_path: &Path) -> Option<PathBuf> {
        MIGRATION_DIRS
            .iter()
            .map(|dir| package_path.join(dir))
            .find(|dir| {
                self.runtime.is_dir(dir)
                    && self
                        .runtime
                        .read_dir(dir)
                        .map(|entries| !entries.is_empty())
                        .unwrap_or(false)
            })
    }

    #[tracing::instrument(skip(self))]
    async fn apply(&self, package: &str, migrations_dir: &Path) -> Result<()> {
        let Some((program, args)) = self.command.split_first() else {
            bail!(
                "{} ships migrations in {:?} but no migrate_command is configured",
                package,
                migrations_dir
            );
        };

        let args: Vec<String> = args
            .iter()
            .map(|a| render(a, package, migrations_dir))
            .collect();
        debug!("Running {} {:?}", program, args);

        let mut command = Command::new(program);
        command
            .args(&args)
            .current_dir(&self.workdir)
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = command
            .output()
            .await
            .with_context(|| format!("Failed to run migrate command '{}'", program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "migrate command exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }

        info!("Migrations applied for {}", package);
        Ok(())
    }
}
