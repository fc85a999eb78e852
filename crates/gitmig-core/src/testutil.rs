//! Helpers for unit tests that need real git repositories.

use std::path::Path;
use std::process::Command;

/// Run git with the given args in `repo_dir`, asserting success, and return
/// stdout as a string.
pub fn run_git(repo_dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Create an empty repository with a default identity configured.
pub fn init_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    run_git(dir.path(), &["init", "-q", "-b", "main"]);
    run_git(dir.path(), &["config", "user.name", "olduser_1"]);
    run_git(dir.path(), &["config", "user.email", "olduser_1@example.com"]);
    dir
}

/// Commit a file with the given author identity.
pub fn commit_as(repo_dir: &Path, file: &str, message: &str, name: &str, email: &str) {
    std::fs::write(repo_dir.join(file), message).unwrap();
    run_git(repo_dir, &["add", file]);
    run_git(
        repo_dir,
        &[
            "-c",
            &format!("user.name={name}"),
            "-c",
            &format!("user.email={email}"),
            "commit",
            "-q",
            "-m",
            message,
        ],
    );
}
