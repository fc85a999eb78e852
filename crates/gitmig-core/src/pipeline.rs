//! Transformation pipeline: archive in, rewritten archive out.
//!
//! Composes the archive codec, the bundle materializer and the history
//! rewrite engine inside a disposable scratch workspace. The workspace is a
//! `tempfile::TempDir`, removed on every exit path; a failed run leaves
//! nothing behind to be accidentally reused.

use std::collections::BTreeSet;
use std::io::Write;

use tracing::info;

use crate::archive;
use crate::bundle;
use crate::domain::error::{MigrateError, Result};
use crate::domain::identity::IdentityMapping;
use crate::git::GitRunner;
use crate::rewrite;

/// Name of the repository bundle inside a GitLab project export.
pub const BUNDLE_FILENAME: &str = "project.bundle";

/// Scratch name for the inbound archive; also the upload filename.
pub const ARCHIVE_FILENAME: &str = "file.tar.gz";

/// Rewrite the repository history inside a project export archive.
///
/// Every sibling file in the archive round-trips untouched; only the bundle
/// is replaced. Returns the outbound archive fully in memory.
pub fn transform_archive(
    archive_bytes: &[u8],
    mapping: &IdentityMapping,
    git: &GitRunner,
) -> Result<Vec<u8>> {
    let workspace = tempfile::tempdir()?;
    let root = workspace.path();
    info!(workspace = %root.display(), "transforming export archive");

    // Land the inbound archive durably before unpacking, so a crash later
    // cannot mask a partial write of the input.
    let inbound = root.join(ARCHIVE_FILENAME);
    {
        let mut file = std::fs::File::create(&inbound)?;
        file.write_all(archive_bytes)?;
        file.flush()?;
        file.sync_all()?;
    }

    archive::extract(archive_bytes, root)?;

    let bundle_path = root.join(BUNDLE_FILENAME);
    if !bundle_path.exists() {
        return Err(MigrateError::ArchiveFormat(format!(
            "archive contains no {BUNDLE_FILENAME}"
        )));
    }

    let repo_dir = root.join("repo.git");
    bundle::clone_from_bundle(git, &bundle_path, &repo_dir)?;

    let outcome = rewrite::rewrite_history(git, &repo_dir, mapping)?;
    info!(
        commits = outcome.commits_seen,
        rewritten = outcome.commits_rewritten,
        "rewrite finished"
    );

    bundle::bundle_from_repo(git, &repo_dir, &bundle_path)?;

    // The working repository must not leak into the outbound archive.
    std::fs::remove_dir_all(&repo_dir)?;

    let exclude: BTreeSet<String> = [ARCHIVE_FILENAME.to_string()].into_iter().collect();
    let outbound = archive::create(root, &exclude)?;
    Ok(outbound)
}
