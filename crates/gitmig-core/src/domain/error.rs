//! Domain-level error taxonomy for gitmig.
//!
//! Every variant is fatal to the migration run: there is no local recovery
//! or partial-success state. Polling-loop "not ready yet" conditions are not
//! errors and never surface here.

/// Errors produced by any stage of a migration run.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Source instance could not resolve the migration target.
    #[error("resolution failed for {target}: {reason}")]
    Resolution { target: String, reason: String },

    /// The one-shot export trigger was rejected by the source instance.
    #[error("export trigger failed for {target}: {reason}")]
    Trigger { target: String, reason: String },

    /// Export payload download failed after the job reported completion.
    #[error("export download failed for {target}: {reason}")]
    Download { target: String, reason: String },

    /// The export archive is malformed or uses an unsupported compression.
    #[error("archive format error: {0}")]
    ArchiveFormat(String),

    /// The repository bundle inside the archive cannot be read.
    #[error("bundle corrupt: {0}")]
    BundleCorrupt(String),

    /// History reconstruction could not complete; the repository is left in
    /// an undefined state and the scratch workspace must be discarded.
    #[error("history rewrite failed: {0}")]
    RewriteFailed(String),

    /// The repository was left locked or partially rewritten by a prior
    /// stage. Invariant violation; never expected after a clean rewrite.
    #[error("repository in unusable state: {0}")]
    RepoState(String),

    /// The destination path cannot be split into namespace and leaf.
    #[error("invalid destination {path:?}: {reason}")]
    InvalidDestination { path: String, reason: String },

    /// The destination instance rejected the import upload.
    #[error("import failed for {path}: {reason}")]
    Import { path: String, reason: String },

    /// Missing or malformed configuration (environment or mapping file).
    #[error("configuration error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for gitmig domain operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_names_the_stage() {
        let err = MigrateError::Resolution {
            target: "group/project".to_string(),
            reason: "404 Not Found".to_string(),
        };
        assert!(err.to_string().contains("resolution failed"));
        assert!(err.to_string().contains("group/project"));

        let err = MigrateError::RewriteFailed("corrupt object".to_string());
        assert!(err.to_string().contains("history rewrite failed"));

        let err = MigrateError::InvalidDestination {
            path: "project".to_string(),
            reason: "no '/' separator".to_string(),
        };
        assert!(err.to_string().contains("invalid destination"));
    }
}
