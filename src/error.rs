//! Error taxonomy for lifecycle operations.
//!
//! Internal plumbing uses `anyhow`; operations that a caller may want to
//! react to (retry, report a result code) surface a [`LifecycleError`].

/// Failure of a single lifecycle operation (install, update, enable, ...).
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("'{0}' not found")]
    NotFound(String),

    #[error("failed to download '{identity}': {reason}")]
    Download { identity: String, reason: String },

    #[error("failed to extract '{identity}': {reason}")]
    Extract { identity: String, reason: String },

    #[error("migrations failed for '{identity}': {reason}")]
    Migration { identity: String, reason: String },

    #[error("{0}")]
    Forbidden(String),

    #[error("another install of '{0}' is in progress")]
    Busy(String),

    #[error("application is not set up yet, run `modman setup` first")]
    SetupRequired,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LifecycleError {
    pub fn download(identity: &str, err: anyhow::Error) -> Self {
        Self::Download {
            identity: identity.to_string(),
            reason: format!("{:#}", err),
        }
    }

    pub fn extract(identity: &str, err: anyhow::Error) -> Self {
        Self::Extract {
            identity: identity.to_string(),
            reason: format!("{:#}", err),
        }
    }

    pub fn migration(identity: &str, err: anyhow::Error) -> Self {
        Self::Migration {
            identity: identity.to_string(),
            reason: format!("{:#}", err),
        }
    }

    /// Stable result code reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Download { .. } => "download_failed",
            Self::Extract { .. } => "extract_failed",
            Self::Migration { .. } => "migration_failed",
            Self::Forbidden(_) => "forbidden",
            Self::Busy(_) => "busy",
            Self::SetupRequired => "setup_required",
            Self::Other(_) => "error",
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound(_) => 2,
            Self::Download { .. } => 3,
            Self::Extract { .. } => 4,
            Self::Migration { .. } => 5,
            Self::Forbidden(_) => 6,
            Self::Busy(_) => 7,
            Self::SetupRequired => 8,
            Self::Other(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            LifecycleError::NotFound("x".into()),
            LifecycleError::download("x", anyhow::anyhow!("boom")),
            LifecycleError::extract("x", anyhow::anyhow!("boom")),
            LifecycleError::migration("x", anyhow::anyhow!("boom")),
            LifecycleError::Forbidden("no".into()),
            LifecycleError::Busy("x".into()),
            LifecycleError::SetupRequired,
            LifecycleError::Other(anyhow::anyhow!("other")),
        ];

        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        let mut exits: Vec<_> = errors.iter().map(|e| e.exit_code()).collect();
        codes.dedup();
        exits.sort();
        exits.dedup();
        assert_eq!(codes.len(), errors.len());
        assert_eq!(exits.len(), errors.len());
    }

    #[test]
    fn test_download_error_keeps_context_chain() {
        let err = anyhow::anyhow!("HTTP 404").context("Failed to start download request");
        let e = LifecycleError::download("connexion-people", err);
        let msg = e.to_string();
        assert!(msg.contains("connexion-people"));
        assert!(msg.contains("Failed to start download request"));
        assert!(msg.contains("HTTP 404"));
        assert_eq!(e.code(), "download_failed");
    }

    #[test]
    fn test_other_is_transparent() {
        let e: LifecycleError = anyhow::anyhow!("disk full").into();
        assert_eq!(e.to_string(), "disk full");
        assert_eq!(e.exit_code(), 1);
    }
}
