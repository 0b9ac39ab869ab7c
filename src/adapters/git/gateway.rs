//! `VcsGateway` implementation shelling out to git.
//!
//! The gateway owns one working copy (`workdir`) cloned from `remote`. Reads
//! of the ready and target branches go through the remote-tracking refs,
//! which `refresh` updates with a fetch. The target branch is only ever
//! written with a lease-protected push.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::branch_name::validate_branch_name;
use crate::domain::errors::{IntegrationError, IntegrationResult};
use crate::domain::models::{Author, Commit, CommitId, CommitRange};
use crate::domain::ports::VcsGateway;

const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';
const LOG_FORMAT: &str = "--format=%H%x1f%P%x1f%an%x1f%ae%x1f%at%x1f%B%x1e";

/// Push rejections that mean somebody else moved the ref first.
const LOST_RACE_MARKERS: [&str; 3] = ["stale info", "fetch first", "non-fast-forward"];

/// [`VcsGateway`] that runs the `git` binary in a job workspace.
///
/// Branches are read from remote-tracking refs after a fetch, and every
/// update of the remote is a lease-protected push.
#[derive(Debug, Clone)]
pub struct GitCliGateway {
    workdir: PathBuf,
    remote: String,
}

impl GitCliGateway {
    /// Gateway for the clone at `workdir`, publishing to `remote`.
    pub fn new(workdir: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            workdir: workdir.into(),
            remote: remote.into(),
        }
    }

    /// Workspace directory.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn remote_ref(&self, branch: &str) -> String {
        format!("refs/remotes/{}/{}", self.remote, branch)
    }

    async fn run(&self, args: &[&str]) -> IntegrationResult<Output> {
        debug!(workdir = %self.workdir.display(), "git {}", args.join(" "));
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .await
            .map_err(|e| IntegrationError::repository(format!("Failed to run git: {e}")))
    }

    /// Run git and return trimmed stdout, failing on a non-zero exit.
    async fn run_ok(&self, args: &[&str]) -> IntegrationResult<String> {
        let output = self.run(args).await?;
        if !output.status.success() {
            return Err(IntegrationError::repository(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run_with_stdin(&self, args: &[&str], input: &str) -> IntegrationResult<()> {
        debug!(workdir = %self.workdir.display(), "git {}", args.join(" "));
        let mut child = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| IntegrationError::repository(format!("Failed to run git: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| IntegrationError::repository(format!("Failed to write to git: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| IntegrationError::repository(format!("Failed to run git: {e}")))?;
        if !output.status.success() {
            return Err(IntegrationError::repository(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn head(&self) -> IntegrationResult<CommitId> {
        self.run_ok(&["rev-parse", "HEAD"]).await.map(CommitId::from)
    }

    async fn conflicted_files(&self) -> Vec<String> {
        match self
            .run_ok(&["diff", "--name-only", "--diff-filter=U"])
            .await
        {
            Ok(stdout) => stdout.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Turn a failed apply into a conflict (when paths are unmerged) or a
    /// repository error, leaving the workspace at `HEAD`.
    async fn apply_failed(&self, commit: &Commit, output: &Output) -> IntegrationError {
        let files = self.conflicted_files().await;
        let _ = self.run(&["cherry-pick", "--abort"]).await;
        let _ = self.run(&["reset", "--hard", "HEAD"]).await;

        if files.is_empty() {
            IntegrationError::repository(format!(
                "cherry-pick of {} failed: {}",
                commit.id.short(),
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        } else {
            IntegrationError::Conflict {
                range: CommitRange::single(commit.id.clone()),
                commit: commit.id.clone(),
                files,
            }
        }
    }

    async fn lease_push(
        &self,
        branch: &str,
        refspec: &str,
        expected: &CommitId,
        range: CommitRange,
    ) -> IntegrationResult<()> {
        let lease = format!("--force-with-lease=refs/heads/{branch}:{expected}");
        let output = self
            .run(&["push", "--porcelain", &lease, &self.remote, refspec])
            .await?;
        if output.status.success() {
            return Ok(());
        }

        let report = format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        if LOST_RACE_MARKERS.iter().any(|marker| report.contains(marker)) {
            Err(IntegrationError::ConcurrentUpdate {
                branch: branch.to_string(),
                expected: expected.clone(),
                range,
            })
        } else {
            Err(IntegrationError::Push {
                branch: branch.to_string(),
                message: report.trim().to_string(),
                range,
            })
        }
    }
}

fn check_branch(branch: &str) -> IntegrationResult<()> {
    validate_branch_name(branch).map_err(|e| IntegrationError::repository(e.to_string()))
}

fn mainline_args(commit: &Commit) -> &'static [&'static str] {
    if commit.is_merge() {
        &["-m", "1"]
    } else {
        &[]
    }
}

/// Parse `git log` output produced with [`LOG_FORMAT`].
fn parse_log(stdout: &str) -> IntegrationResult<Vec<Commit>> {
    stdout
        .split(RECORD_SEP)
        .map(|record| record.trim_start_matches('\n'))
        .filter(|record| !record.is_empty())
        .map(parse_record)
        .collect()
}

fn parse_record(record: &str) -> IntegrationResult<Commit> {
    let fields: Vec<&str> = record.splitn(6, FIELD_SEP).collect();
    let &[id, parents, name, email, time, message] = fields.as_slice() else {
        return Err(IntegrationError::repository(format!(
            "unexpected git log record: {record:?}"
        )));
    };

    let seconds: i64 = time
        .parse()
        .map_err(|_| IntegrationError::repository(format!("bad commit time '{time}'")))?;
    let timestamp = Utc
        .timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| IntegrationError::repository(format!("bad commit time '{time}'")))?;

    Ok(Commit {
        id: CommitId::new(id),
        parents: parents.split_whitespace().map(CommitId::from).collect(),
        author: Author::new(name, email),
        message: message.trim_end_matches('\n').to_string(),
        timestamp,
    })
}

#[async_trait]
impl VcsGateway for GitCliGateway {
    #[instrument(skip(self), fields(remote = %self.remote))]
    async fn refresh(&self) -> IntegrationResult<()> {
        self.run_ok(&["fetch", "--prune", &self.remote]).await?;
        Ok(())
    }

    async fn resolve_branch(&self, branch: &str) -> IntegrationResult<Option<CommitId>> {
        check_branch(branch)?;
        let spec = format!("{}^{{commit}}", self.remote_ref(branch));
        let output = self
            .run(&["rev-parse", "--verify", "--quiet", &spec])
            .await?;

        match output.status.code() {
            Some(0) => Ok(Some(CommitId::new(
                String::from_utf8_lossy(&output.stdout).trim(),
            ))),
            Some(1) => Ok(None),
            _ => Err(IntegrationError::repository(format!(
                "git rev-parse failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    async fn list_commits(
        &self,
        branch: &str,
        exclude: &[CommitId],
    ) -> IntegrationResult<Vec<Commit>> {
        check_branch(branch)?;
        let head = self.remote_ref(branch);
        let hidden: Vec<String> = exclude.iter().map(|id| format!("^{id}")).collect();

        let mut args = vec!["log", "--topo-order", LOG_FORMAT, head.as_str()];
        args.extend(hidden.iter().map(String::as_str));
        args.push("--");

        let stdout = self.run_ok(&args).await?;
        parse_log(&stdout)
    }

    async fn is_ancestor(
        &self,
        ancestor: &CommitId,
        descendant: &CommitId,
    ) -> IntegrationResult<bool> {
        let output = self
            .run(&[
                "merge-base",
                "--is-ancestor",
                ancestor.as_str(),
                descendant.as_str(),
            ])
            .await?;

        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(IntegrationError::repository(format!(
                "git merge-base failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    #[instrument(skip(self))]
    async fn checkout(&self, branch: &str) -> IntegrationResult<CommitId> {
        check_branch(branch)?;
        self.reset_workspace().await?;
        let start = self.remote_ref(branch);
        self.run_ok(&["checkout", "-f", "--no-track", "-B", branch, &start])
            .await?;
        self.head().await
    }

    async fn checkout_commit(&self, commit: &CommitId) -> IntegrationResult<()> {
        self.run_ok(&["reset", "--hard", commit.as_str()]).await?;
        Ok(())
    }

    #[instrument(skip(self, commit), fields(commit = %commit.id.short()))]
    async fn cherry_pick(&self, commit: &Commit) -> IntegrationResult<CommitId> {
        let mut args = vec!["cherry-pick", "--allow-empty", "--keep-redundant-commits"];
        args.extend_from_slice(mainline_args(commit));
        args.push(commit.id.as_str());

        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(self.apply_failed(commit, &output).await);
        }
        self.head().await
    }

    #[instrument(skip(self, commits, message), fields(count = commits.len(), author = %author))]
    async fn squash(
        &self,
        commits: &[Commit],
        author: &Author,
        message: &str,
    ) -> IntegrationResult<CommitId> {
        for commit in commits {
            let mut args = vec!["cherry-pick", "--no-commit"];
            args.extend_from_slice(mainline_args(commit));
            args.push(commit.id.as_str());

            let output = self.run(&args).await?;
            if !output.status.success() {
                return Err(self.apply_failed(commit, &output).await);
            }
        }

        let author_arg = format!("--author={author}");
        self.run_with_stdin(
            &[
                "commit",
                "--allow-empty",
                "--cleanup=verbatim",
                &author_arg,
                "-F",
                "-",
            ],
            message,
        )
        .await?;
        self.head().await
    }

    #[instrument(skip(self))]
    async fn push_ref(
        &self,
        branch: &str,
        new_head: &CommitId,
        expected_old: &CommitId,
    ) -> IntegrationResult<()> {
        check_branch(branch)?;
        let refspec = format!("{new_head}:refs/heads/{branch}");
        self.lease_push(
            branch,
            &refspec,
            expected_old,
            CommitRange::single(new_head.clone()),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn delete_branch(&self, branch: &str, expected: &CommitId) -> IntegrationResult<()> {
        check_branch(branch)?;
        let refspec = format!(":refs/heads/{branch}");
        self.lease_push(
            branch,
            &refspec,
            expected,
            CommitRange::single(expected.clone()),
        )
        .await
    }

    async fn reset_workspace(&self) -> IntegrationResult<()> {
        // nothing to abort is the common case
        let _ = self.run(&["cherry-pick", "--abort"]).await;
        self.run_ok(&["reset", "--hard"]).await?;
        self.run_ok(&["clean", "-fd"]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_records() {
        let stdout = "aaa\u{1f}bbb ccc\u{1f}Ann\u{1f}ann@example.com\u{1f}1700000000\u{1f}Merge \"x\"\n\nbody\n\u{1e}\nbbb\u{1f}\u{1f}Bo\u{1f}bo@example.com\u{1f}1690000000\u{1f}root\n\u{1e}\n";
        let commits = parse_log(stdout).unwrap();

        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].id.as_str(), "aaa");
        assert!(commits[0].is_merge());
        assert_eq!(commits[0].message, "Merge \"x\"\n\nbody");
        assert_eq!(commits[0].author.email, "ann@example.com");
        assert!(commits[1].parents.is_empty());
        assert_eq!(commits[1].timestamp.timestamp(), 1_690_000_000);
    }

    #[test]
    fn test_parse_log_rejects_truncated_record() {
        assert!(parse_log("aaa\u{1f}bbb\u{1e}").is_err());
    }

    #[test]
    fn test_parse_empty_log() {
        assert!(parse_log("").unwrap().is_empty());
    }

    #[test]
    fn test_remote_ref() {
        let gateway = GitCliGateway::new("/tmp/ws", "upstream");
        assert_eq!(gateway.remote_ref("ready"), "refs/remotes/upstream/ready");
    }
}
