//! Common test utilities for integration tests
//!
//! Provides git repository fixtures and logging setup shared across the
//! integration test files.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Run git in `dir`, panicking on failure. Returns stdout without trailing
/// whitespace.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim_end().to_string()
}

fn configure_identity(dir: &Path) {
    git(dir, &["config", "user.email", "ci@example.com"]);
    git(dir, &["config", "user.name", "CI Robot"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

/// A bare "origin" repository, a developer clone that pushes to it and a
/// job workspace clone the engine works in.
///
/// The origin starts with one commit on `master`, and `ready` points at it.
pub struct GitFixture {
    _dir: TempDir,
    pub origin: PathBuf,
    pub developer: PathBuf,
    pub workspace: PathBuf,
}

impl GitFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir for git repos");
        let origin = dir.path().join("origin.git");
        let developer = dir.path().join("developer");
        let workspace = dir.path().join("workspace");

        git(dir.path(), &["init", "--bare", "origin.git"]);
        git(&origin, &["symbolic-ref", "HEAD", "refs/heads/master"]);

        git(dir.path(), &["clone", "--quiet", "origin.git", "developer"]);
        configure_identity(&developer);
        git(&developer, &["symbolic-ref", "HEAD", "refs/heads/master"]);
        std::fs::write(developer.join("README"), "base\n").expect("Failed to write README");
        git(&developer, &["add", "README"]);
        git(&developer, &["commit", "--quiet", "-m", "initial commit"]);
        git(&developer, &["push", "--quiet", "origin", "master", "master:ready"]);

        git(dir.path(), &["clone", "--quiet", "origin.git", "workspace"]);
        configure_identity(&workspace);

        Self {
            _dir: dir,
            origin,
            developer,
            workspace,
        }
    }

    /// Commit `files` on top of the origin's `branch` as `author` and push.
    /// Returns the new commit id.
    pub fn push_commit(
        &self,
        branch: &str,
        author: &str,
        message: &str,
        files: &[(&str, &str)],
    ) -> String {
        let dev = &self.developer;
        git(dev, &["fetch", "--quiet", "origin"]);
        let start = format!("origin/{branch}");
        git(dev, &["checkout", "--quiet", "-B", branch, &start]);

        for (path, content) in files {
            std::fs::write(dev.join(path), content).expect("Failed to write file");
            git(dev, &["add", path]);
        }

        let author = format!("{author} <{author}@example.com>");
        let mut child = Command::new("git")
            .args(["commit", "--quiet", "--cleanup=verbatim", "--author", &author, "-F", "-"])
            .current_dir(dev)
            .stdin(Stdio::piped())
            .spawn()
            .expect("Failed to run git commit");
        child
            .stdin
            .take()
            .expect("stdin is piped")
            .write_all(message.as_bytes())
            .expect("Failed to write commit message");
        assert!(child.wait().expect("git commit did not run").success());

        git(dev, &["push", "--quiet", "origin", branch]);
        git(dev, &["rev-parse", "HEAD"])
    }

    /// Current head of `branch` on the origin, if the branch exists.
    pub fn head(&self, branch: &str) -> Option<String> {
        let output = Command::new("git")
            .args(["rev-parse", "--verify", "--quiet", &format!("refs/heads/{branch}")])
            .current_dir(&self.origin)
            .output()
            .expect("Failed to run git rev-parse");
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Full message of a commit in the origin, trailing newlines removed.
    pub fn message(&self, id: &str) -> String {
        git(&self.origin, &["log", "-1", "--format=%B", id])
            .trim_end_matches('\n')
            .to_string()
    }

    pub fn author(&self, id: &str) -> String {
        git(&self.origin, &["log", "-1", "--format=%an <%ae>", id])
    }

    /// Commits on `branch` after `since`, oldest first.
    pub fn log_since(&self, branch: &str, since: &str) -> Vec<String> {
        let range = format!("{since}..{branch}");
        git(&self.origin, &["rev-list", "--reverse", "--first-parent", &range])
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn file_at(&self, id: &str, path: &str) -> String {
        git(&self.origin, &["show", &format!("{id}:{path}")])
    }
}
