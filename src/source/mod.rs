//! Release source abstraction.
//!
//! A release source answers one question per package repository: what is the
//! latest published version, and where can its archive be downloaded.

mod github;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

use crate::archive::ArchiveFormat;

pub use github::GitHubSource;

/// Repository identifier (owner/repo format).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl RepoId {
    pub fn new(owner: &str, repo: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// The latest published release of a package repository.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Release {
    /// Version tag (e.g., "v1.0.0")
    pub tag: String,
    /// Release title
    pub name: Option<String>,
    /// Release notes
    pub body: Option<String>,
    /// Source archive URLs
    pub zipball_url: Option<String>,
    pub tarball_url: Option<String>,
}

impl Release {
    /// Archive URL for the requested format, if the source published one.
    pub fn archive_url(&self, format: ArchiveFormat) -> Option<&str> {
        match format {
            ArchiveFormat::Zip => self.zipball_url.as_deref(),
            ArchiveFormat::TarGz => self.tarball_url.as_deref(),
        }
    }

    /// Human-readable description: the release title, else its notes.
    pub fn description(&self) -> Option<&str> {
        self.name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.body.as_deref().filter(|s| !s.trim().is_empty()))
    }
}

/// Trait for remote release registries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Fetch the latest published release of a repository.
    ///
    /// Any failure (network, non-success status, malformed body, no release)
    /// is returned as an error; callers decide how soft it is.
    async fn latest_release(&self, repo: &RepoId) -> Result<Release>;
}
