//! gitmig core library.
//!
//! Moves a project or group between GitLab instances while rewriting commit
//! authorship in every historical commit: drives the source's asynchronous
//! export job, unpacks the export archive, rewrites the repository bundle's
//! history against a static identity-mapping table, repackages the archive,
//! and uploads it to the destination instance.

pub mod archive;
pub mod bundle;
pub mod client;
pub mod config;
pub mod domain;
pub mod export;
pub mod git;
pub mod import;
pub mod migrate;
pub mod pipeline;
pub mod rewrite;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testutil;

pub use client::{DestinationClient, SourceClient};
pub use config::{Config, InstanceConfig};
pub use domain::{
    Identity, IdentityMapping, ImportDestination, MigrateError, MigrationTarget, Result,
    TargetKind,
};
pub use export::{CompletionStrategy, DownloadProbe, ExportPhase, StatusPoll};
pub use git::GitRunner;
pub use migrate::{migrate_group, migrate_project};
pub use pipeline::transform_archive;
pub use rewrite::{collect_authors, rewrite_history, RewriteOutcome};
pub use telemetry::init_tracing;

/// gitmig version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
