//! Bundle materialization: bundle file <-> working repository.
//!
//! GitLab exports carry the repository as a single git bundle. A mirror
//! clone turns it into a bare repository with every ref (branches, tags and
//! anything else the bundle advertises) preserved verbatim, and
//! `git bundle create --all` serializes the rewritten repository back.

use std::path::Path;

use tracing::debug;

use crate::domain::error::{MigrateError, Result};
use crate::git::GitRunner;

/// Materialise a bundle into a bare mirror repository at `dest_dir`.
///
/// Every ref and every object reachable from the bundle ends up in the
/// repository. Fails with [`MigrateError::BundleCorrupt`] when the bundle
/// cannot be read.
pub fn clone_from_bundle(git: &GitRunner, bundle_path: &Path, dest_dir: &Path) -> Result<()> {
    let parent = bundle_path
        .parent()
        .ok_or_else(|| MigrateError::BundleCorrupt("bundle path has no parent".to_string()))?;
    git.run(
        parent,
        &[
            "clone",
            "--quiet",
            "--mirror",
            &bundle_path.to_string_lossy(),
            &dest_dir.to_string_lossy(),
        ],
    )
    .map_err(MigrateError::BundleCorrupt)?;
    debug!(repo = %dest_dir.display(), "materialised bundle");
    Ok(())
}

/// Serialize every ref of the repository at `repo_dir` into a bundle file.
///
/// The repository must be in a clean state; leftover lock files mean a prior
/// stage crashed mid-update, which is an invariant violation surfaced as
/// [`MigrateError::RepoState`].
pub fn bundle_from_repo(git: &GitRunner, repo_dir: &Path, bundle_path: &Path) -> Result<()> {
    check_repo_unlocked(repo_dir)?;
    git.run(
        repo_dir,
        &[
            "bundle",
            "create",
            &bundle_path.to_string_lossy(),
            "--all",
        ],
    )
    .map_err(MigrateError::RepoState)?;
    debug!(bundle = %bundle_path.display(), "serialized repository");
    Ok(())
}

fn check_repo_unlocked(repo_dir: &Path) -> Result<()> {
    // Bare repositories keep refs metadata at the top level, working clones
    // under .git/.
    for base in [repo_dir.to_path_buf(), repo_dir.join(".git")] {
        for lock in ["packed-refs.lock", "HEAD.lock", "index.lock"] {
            if base.join(lock).exists() {
                return Err(MigrateError::RepoState(format!(
                    "{lock} present in {}: repository left locked by a prior stage",
                    base.display()
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{init_repo, run_git};

    #[test]
    fn bundle_round_trips_all_refs() {
        let repo = init_repo();
        run_git(repo.path(), &["commit", "--allow-empty", "-m", "one"]);
        run_git(repo.path(), &["tag", "v1"]);
        run_git(repo.path(), &["branch", "feature"]);

        let git = GitRunner::from_env();
        let scratch = tempfile::tempdir().unwrap();
        let bundle = scratch.path().join("project.bundle");
        bundle_from_repo(&git, repo.path(), &bundle).unwrap();

        let clone = scratch.path().join("clone");
        clone_from_bundle(&git, &bundle, &clone).unwrap();

        let refs = run_git(&clone, &["for-each-ref", "--format=%(refname)"]);
        assert!(refs.contains("refs/heads/feature"));
        assert!(refs.contains("refs/tags/v1"));
    }

    #[test]
    fn unreadable_bundle_is_bundle_corrupt() {
        let scratch = tempfile::tempdir().unwrap();
        let bundle = scratch.path().join("project.bundle");
        std::fs::write(&bundle, b"not a bundle").unwrap();

        let git = GitRunner::from_env();
        let err = clone_from_bundle(&git, &bundle, &scratch.path().join("clone")).unwrap_err();
        assert!(matches!(err, MigrateError::BundleCorrupt(_)));
    }

    #[test]
    fn locked_repo_is_repo_state_error() {
        let repo = init_repo();
        run_git(repo.path(), &["commit", "--allow-empty", "-m", "one"]);
        std::fs::write(repo.path().join("packed-refs.lock"), b"").unwrap();

        let git = GitRunner::from_env();
        let scratch = tempfile::tempdir().unwrap();
        let err =
            bundle_from_repo(&git, repo.path(), &scratch.path().join("out.bundle")).unwrap_err();
        assert!(matches!(err, MigrateError::RepoState(_)));
    }
}
