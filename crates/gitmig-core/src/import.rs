//! Import orchestrator.
//!
//! Parses the destination path, resolves subgroup parents, and uploads the
//! archive. Destination-path validation happens before any network call; a
//! rejected upload is fatal with no retry or rollback, since the destination
//! instance owns import-job semantics past the POST.

use tracing::info;

use crate::client::DestinationClient;
use crate::domain::error::Result;
use crate::domain::target::ImportDestination;

/// Upload a project export archive to `namespace/project`.
pub async fn import_project(
    client: &DestinationClient,
    dest_path: &str,
    archive_bytes: Vec<u8>,
) -> Result<()> {
    let dest = ImportDestination::for_project(dest_path)?;
    info!(
        namespace = %dest.namespace_path,
        path = %dest.leaf_path,
        bytes = archive_bytes.len(),
        "importing project"
    );
    client.import_project(&dest, archive_bytes).await?;
    info!(path = %dest.leaf_path, "project import accepted");
    Ok(())
}

/// Upload a group export archive.
///
/// A destination like `team-a/service-x` is a subgroup: the parent group
/// `team-a` is looked up on the destination instance and its numeric id is
/// attached as `parent_id`. A bare path creates a top-level group.
pub async fn import_group(
    client: &DestinationClient,
    dest_path: &str,
    display_name: Option<&str>,
    archive_bytes: Vec<u8>,
) -> Result<()> {
    let mut dest = ImportDestination::for_group(dest_path)?;
    if let Some(name) = display_name {
        dest = dest.with_display_name(name);
    }
    if dest.is_subgroup() {
        let parent_id = client.group_id(&dest.namespace_path).await?;
        info!(parent = %dest.namespace_path, parent_id, "resolved parent group");
        dest.parent_group_id = Some(parent_id);
    }
    info!(
        path = %dest.leaf_path,
        parent = ?dest.parent_group_id,
        bytes = archive_bytes.len(),
        "importing group"
    );
    client.import_group(&dest, archive_bytes).await?;
    info!(path = %dest.leaf_path, "group import accepted");
    Ok(())
}
