//! Top-level migration flows: export, transform, import, strictly in that
//! order with no overlap between runs.

use tracing::info;

use crate::client::{DestinationClient, SourceClient};
use crate::config::Config;
use crate::domain::error::Result;
use crate::domain::identity::IdentityMapping;
use crate::domain::target::TargetKind;
use crate::git::GitRunner;
use crate::{export, import, pipeline};

/// Migrate a single project, rewriting commit authorship along the way.
///
/// `dest` defaults to the project's resolved path on the source instance.
pub async fn migrate_project(config: &Config, source: &str, dest: Option<&str>) -> Result<()> {
    let mapping = IdentityMapping::load(&config.author_map)?;
    let git = GitRunner::new(config.git_binary.clone());
    let src = SourceClient::new(&config.source)?;
    let dst = DestinationClient::new(&config.destination)?;

    let (target, payload) = export::export(&src, TargetKind::Project, source).await?;

    let dest_path = dest.unwrap_or(&target.resolved_path);
    info!(source = %target.resolved_path, dest = %dest_path, "migrating project");

    let transformed = pipeline::transform_archive(&payload, &mapping, &git)?;
    import::import_project(&dst, dest_path, transformed).await
}

/// Migrate a group. Group export archives carry no repository bundle, so
/// the payload passes through untransformed; project repositories move with
/// their own project migrations.
pub async fn migrate_group(config: &Config, source: &str, dest: Option<&str>) -> Result<()> {
    let src = SourceClient::new(&config.source)?;
    let dst = DestinationClient::new(&config.destination)?;

    let (target, payload) = export::export(&src, TargetKind::Group, source).await?;

    let dest_path = dest.unwrap_or(&target.resolved_path);
    info!(source = %target.resolved_path, dest = %dest_path, "migrating group");

    import::import_group(&dst, dest_path, Some(&target.resolved_name), payload).await
}
