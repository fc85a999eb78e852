//! Process configuration, sourced from the environment.

use std::path::PathBuf;

use crate::domain::error::{MigrateError, Result};

/// Default per-request timeout for both instances, in seconds.
///
/// Export downloads of large projects can take minutes; the polling loop has
/// no overall deadline by design, only this per-request bound.
pub const HTTP_TIMEOUT_SECS: u64 = 600;

/// Connection settings for one GitLab instance.
#[derive(Debug, Clone)]
pub struct InstanceConfig {
    /// Base URL, e.g. `https://gitlab.example.com`.
    pub base_url: String,
    /// Private token sent as the `PRIVATE-TOKEN` header.
    pub token: String,
    /// When `false`, TLS certificate verification is disabled.
    pub tls_verify: bool,
}

/// Full run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Source instance the export runs against.
    pub source: InstanceConfig,
    /// Destination instance the import runs against.
    pub destination: InstanceConfig,
    /// Path to the git executable used for bundle work.
    pub git_binary: PathBuf,
    /// Path to the author identity-mapping JSON file.
    pub author_map: PathBuf,
}

fn require(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| {
        MigrateError::Config(format!("required environment variable {var} is not set"))
    })
}

fn tls_verify_from_env() -> Result<bool> {
    match std::env::var("TLS_VERIFY") {
        Ok(v) => match v.as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(MigrateError::Config(format!(
                "TLS_VERIFY must be true or false, got {other:?}"
            ))),
        },
        Err(_) => Ok(true),
    }
}

impl Config {
    /// Read the full configuration from the environment.
    ///
    /// Required: `SRC_GITLAB_URL`, `SRC_TOKEN`, `DST_GITLAB_URL`, `DST_TOKEN`,
    /// `AUTHOR_MAP`. Optional: `GIT_BINARY` (default `git`), `TLS_VERIFY`
    /// (default `true`, applies to both instances).
    pub fn from_env() -> Result<Self> {
        let tls_verify = tls_verify_from_env()?;
        Ok(Config {
            source: InstanceConfig {
                base_url: require("SRC_GITLAB_URL")?,
                token: require("SRC_TOKEN")?,
                tls_verify,
            },
            destination: InstanceConfig {
                base_url: require("DST_GITLAB_URL")?,
                token: require("DST_TOKEN")?,
                tls_verify,
            },
            git_binary: git_binary_from_env(),
            author_map: PathBuf::from(require("AUTHOR_MAP")?),
        })
    }
}

/// Path to the git executable, `GIT_BINARY` or plain `git` from `PATH`.
pub fn git_binary_from_env() -> PathBuf {
    std::env::var("GIT_BINARY")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("git"))
}
