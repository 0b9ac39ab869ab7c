//! Version-control gateway port.

use async_trait::async_trait;

use crate::domain::errors::IntegrationResult;
use crate::domain::models::{Author, Commit, CommitId};

/// Capability surface over the backing repository.
///
/// A gateway is bound to one disposable workspace (a working copy) and to
/// the authoritative repository holding the ready and target branches.
/// Branch reads always reflect the authoritative repository as of the last
/// [`refresh`](VcsGateway::refresh); workspace operations never touch it
/// until [`push_ref`](VcsGateway::push_ref).
///
/// Errors:
/// - conflicts while applying a commit are reported as
///   `IntegrationError::Conflict` and leave no partial state behind
/// - a lost compare-and-swap in `push_ref` is `IntegrationError::ConcurrentUpdate`
/// - any other failure is `IntegrationError::Repository` or `IntegrationError::Push`
#[async_trait]
pub trait VcsGateway: Send + Sync {
    /// Synchronize the view of the authoritative repository.
    async fn refresh(&self) -> IntegrationResult<()>;

    /// Current head of a branch, `None` when the branch does not exist.
    async fn resolve_branch(&self, branch: &str) -> IntegrationResult<Option<CommitId>>;

    /// Commits reachable from `branch`, newest first, leaving out everything
    /// reachable from any commit in `exclude`.
    async fn list_commits(
        &self,
        branch: &str,
        exclude: &[CommitId],
    ) -> IntegrationResult<Vec<Commit>>;

    /// Whether `ancestor` is reachable from `descendant` (a commit is its own
    /// ancestor).
    async fn is_ancestor(
        &self,
        ancestor: &CommitId,
        descendant: &CommitId,
    ) -> IntegrationResult<bool>;

    /// Check out `branch` as it exists in the authoritative repository,
    /// discarding any local state. Returns the checked-out head.
    async fn checkout(&self, branch: &str) -> IntegrationResult<CommitId>;

    /// Move the workspace to an existing commit without creating objects.
    async fn checkout_commit(&self, commit: &CommitId) -> IntegrationResult<()>;

    /// Replay one commit on top of the workspace head, keeping its author
    /// and message. Merge commits are replayed against their first parent.
    async fn cherry_pick(&self, commit: &Commit) -> IntegrationResult<CommitId>;

    /// Apply all `commits` on top of the workspace head as one new commit.
    async fn squash(
        &self,
        commits: &[Commit],
        author: &Author,
        message: &str,
    ) -> IntegrationResult<CommitId>;

    /// Point `branch` at `new_head` in the authoritative repository, only if
    /// it still points at `expected_old`.
    async fn push_ref(
        &self,
        branch: &str,
        new_head: &CommitId,
        expected_old: &CommitId,
    ) -> IntegrationResult<()>;

    /// Delete `branch` from the authoritative repository, only if it still
    /// points at `expected`.
    async fn delete_branch(&self, branch: &str, expected: &CommitId) -> IntegrationResult<()>;

    /// Drop any uncommitted or in-progress state in the workspace.
    async fn reset_workspace(&self) -> IntegrationResult<()>;
}
