//! Thin wrapper around the external git binary.
//!
//! All repository work (bundle materialization, object plumbing) shells out
//! to git; the binary path comes from configuration so air-gapped hosts can
//! point at a pinned executable.

use std::io::{BufRead, BufReader, Lines, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::config::git_binary_from_env;

/// Runs git subcommands in a given repository directory.
#[derive(Debug, Clone)]
pub struct GitRunner {
    binary: PathBuf,
}

impl GitRunner {
    pub fn new(binary: PathBuf) -> Self {
        GitRunner { binary }
    }

    /// Use `GIT_BINARY` from the environment, or `git` from `PATH`.
    pub fn from_env() -> Self {
        GitRunner::new(git_binary_from_env())
    }

    /// Run git in `dir` and return stdout, or a descriptive message on any
    /// spawn failure or non-zero exit. Callers map the message into the
    /// error variant appropriate for their stage.
    pub fn run(&self, dir: &Path, args: &[&str]) -> Result<Vec<u8>, String> {
        let output = Command::new(&self.binary)
            .args(args)
            .current_dir(dir)
            .output()
            .map_err(|e| format!("failed to run {}: {e}", self.binary.display()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output.stdout)
    }

    /// Run git in `dir` with bytes piped to stdin and return stdout.
    pub fn run_with_input(&self, dir: &Path, args: &[&str], input: &[u8]) -> Result<Vec<u8>, String> {
        let mut child = Command::new(&self.binary)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("failed to run {}: {e}", self.binary.display()))?;
        child
            .stdin
            .take()
            .ok_or_else(|| "git stdin unavailable".to_string())?
            .write_all(input)
            .map_err(|e| format!("cannot write to git stdin: {e}"))?;
        let output = child
            .wait_with_output()
            .map_err(|e| format!("git did not exit cleanly: {e}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output.stdout)
    }

    /// Spawn git in `dir` and stream its stdout line by line.
    ///
    /// Used for traversals that must not buffer the whole output (rev-list
    /// over large histories). Call [`GitStream::finish`] after consuming the
    /// lines to surface a non-zero exit.
    pub fn stream(&self, dir: &Path, args: &[&str]) -> Result<GitStream, String> {
        let mut child = Command::new(&self.binary)
            .args(args)
            .current_dir(dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("failed to run {}: {e}", self.binary.display()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| "git stdout unavailable".to_string())?;
        Ok(GitStream {
            lines: BufReader::new(stdout).lines(),
            child,
            args: args.join(" "),
        })
    }
}

/// A line-by-line stream over a running git subprocess.
pub struct GitStream {
    lines: Lines<BufReader<ChildStdout>>,
    child: Child,
    args: String,
}

impl GitStream {
    /// Wait for the subprocess and fail on a non-zero exit.
    pub fn finish(mut self) -> Result<(), String> {
        let output = self
            .child
            .wait_with_output()
            .map_err(|e| format!("git did not exit cleanly: {e}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("git {} failed: {}", self.args, stderr.trim()));
        }
        Ok(())
    }
}

impl Iterator for GitStream {
    type Item = Result<String, String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines
            .next()
            .map(|l| l.map_err(|e| format!("cannot read git output: {e}")))
    }
}
