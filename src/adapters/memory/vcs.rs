//! In-memory version control backend for tests and dry runs.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::RwLock;

use crate::domain::errors::{IntegrationError, IntegrationResult};
use crate::domain::models::{Author, Commit, CommitId, CommitRange};
use crate::domain::ports::VcsGateway;
use crate::services::commit_queue::order_oldest_first;

type Tree = BTreeMap<String, String>;

const EPOCH: i64 = 1_700_000_000;

#[derive(Debug, Default)]
struct Repo {
    commits: HashMap<CommitId, Commit>,
    trees: HashMap<CommitId, Tree>,
    branches: BTreeMap<String, CommitId>,
    workspace: Option<CommitId>,
    next_id: u64,
    push_failure: Option<String>,
    resets: usize,
}

impl Repo {
    fn tree(&self, id: Option<&CommitId>) -> Tree {
        id.and_then(|id| self.trees.get(id)).cloned().unwrap_or_default()
    }

    fn store(&mut self, parents: Vec<CommitId>, author: Author, message: &str, tree: Tree) -> CommitId {
        self.next_id += 1;
        let n = self.next_id;
        let id = CommitId::new(format!(
            "{n:010x}{:030x}",
            n.wrapping_mul(0x9e37_79b9_7f4a_7c15)
        ));
        let seconds = i64::try_from(n).unwrap_or(i64::MAX / 2) * 60;
        let commit = Commit {
            id: id.clone(),
            parents,
            author,
            message: message.to_string(),
            timestamp: Utc
                .timestamp_opt(EPOCH + seconds, 0)
                .single()
                .unwrap_or_else(Utc::now),
        };
        self.commits.insert(id.clone(), commit);
        self.trees.insert(id.clone(), tree);
        id
    }

    fn require(&self, id: &CommitId) -> IntegrationResult<&Commit> {
        self.commits
            .get(id)
            .ok_or_else(|| IntegrationError::repository(format!("unknown commit {id}")))
    }

    fn reachable(&self, from: &CommitId) -> HashSet<CommitId> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([from.clone()]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(commit) = self.commits.get(&id) {
                queue.extend(commit.parents.iter().cloned());
            }
        }
        seen
    }

    /// Three-way apply of `commit`'s change (against its first parent) onto
    /// `onto`. Paths changed on both sides to different content conflict.
    fn apply(&self, commit: &Commit, onto: &mut Tree) -> IntegrationResult<()> {
        let base = self.tree(commit.first_parent());
        let theirs = self.tree(Some(&commit.id));

        let changed: BTreeSet<&String> = base
            .keys()
            .chain(theirs.keys())
            .filter(|path| base.get(*path) != theirs.get(*path))
            .collect();

        let mut conflicts = Vec::new();
        for path in changed {
            let ours = onto.get(path);
            let wanted = theirs.get(path);
            if ours == wanted {
                continue;
            }
            if ours != base.get(path) {
                conflicts.push(path.clone());
                continue;
            }
            match wanted {
                Some(content) => onto.insert(path.clone(), content.clone()),
                None => onto.remove(path),
            };
        }

        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(IntegrationError::Conflict {
                range: CommitRange::single(commit.id.clone()),
                commit: commit.id.clone(),
                files: conflicts,
            })
        }
    }

    fn workspace_head(&self) -> IntegrationResult<CommitId> {
        self.workspace
            .clone()
            .ok_or_else(|| IntegrationError::repository("workspace has no checkout"))
    }
}

/// Simulated repository implementing [`VcsGateway`].
///
/// Commits carry a flat file map so replays detect conflicts the way a
/// three-way merge would. Ids and timestamps are deterministic.
#[derive(Debug, Default)]
pub struct InMemoryVcs {
    repo: RwLock<Repo>,
}

impl InMemoryVcs {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit `files` on top of `branch` (a root commit when the branch does
    /// not exist yet) and advance the branch.
    pub async fn commit(
        &self,
        branch: &str,
        author: &str,
        message: &str,
        files: &[(&str, &str)],
    ) -> CommitId {
        let mut repo = self.repo.write().await;
        let parent = repo.branches.get(branch).cloned();
        let mut tree = repo.tree(parent.as_ref());
        for (path, content) in files {
            tree.insert((*path).to_string(), (*content).to_string());
        }
        let author = Author::new(author, format!("{author}@example.com"));
        let id = repo.store(parent.into_iter().collect(), author, message, tree);
        repo.branches.insert(branch.to_string(), id.clone());
        id
    }

    /// Point `branch` at `id`, creating or force-moving it.
    pub async fn set_branch(&self, branch: &str, id: &CommitId) {
        self.repo
            .write()
            .await
            .branches
            .insert(branch.to_string(), id.clone());
    }

    /// Head of `branch`, if it exists.
    pub async fn branch_head(&self, branch: &str) -> Option<CommitId> {
        self.repo.read().await.branches.get(branch).cloned()
    }

    /// Stored commit `id`.
    pub async fn commit_details(&self, id: &CommitId) -> Option<Commit> {
        self.repo.read().await.commits.get(id).cloned()
    }

    /// Content of `path` in commit `id`.
    pub async fn file_at(&self, id: &CommitId, path: &str) -> Option<String> {
        self.repo
            .read()
            .await
            .trees
            .get(id)
            .and_then(|tree| tree.get(path).cloned())
    }

    /// Commits on `branch` after `since`, oldest first.
    pub async fn log_since(&self, branch: &str, since: &CommitId) -> Vec<Commit> {
        let commits = self
            .list_commits(branch, std::slice::from_ref(since))
            .await
            .unwrap_or_default();
        order_oldest_first(commits)
    }

    /// Number of commit objects in the repository.
    pub async fn object_count(&self) -> usize {
        self.repo.read().await.commits.len()
    }

    /// Commit the workspace is at.
    pub async fn workspace_head(&self) -> Option<CommitId> {
        self.repo.read().await.workspace.clone()
    }

    /// How many times the workspace was reset.
    pub async fn workspace_resets(&self) -> usize {
        self.repo.read().await.resets
    }

    /// Make every following push fail with `message`.
    pub async fn fail_pushes(&self, message: &str) {
        self.repo.write().await.push_failure = Some(message.to_string());
    }
}

#[async_trait]
impl VcsGateway for InMemoryVcs {
    async fn refresh(&self) -> IntegrationResult<()> {
        Ok(())
    }

    async fn resolve_branch(&self, branch: &str) -> IntegrationResult<Option<CommitId>> {
        Ok(self.branch_head(branch).await)
    }

    async fn list_commits(
        &self,
        branch: &str,
        exclude: &[CommitId],
    ) -> IntegrationResult<Vec<Commit>> {
        let repo = self.repo.read().await;
        let head = repo
            .branches
            .get(branch)
            .ok_or_else(|| IntegrationError::repository(format!("unknown branch '{branch}'")))?;

        let mut hidden = HashSet::new();
        for id in exclude {
            hidden.extend(repo.reachable(id));
        }

        let mut commits: Vec<Commit> = repo
            .reachable(head)
            .into_iter()
            .filter(|id| !hidden.contains(id))
            .filter_map(|id| repo.commits.get(&id).cloned())
            .collect();
        commits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        Ok(commits)
    }

    async fn is_ancestor(
        &self,
        ancestor: &CommitId,
        descendant: &CommitId,
    ) -> IntegrationResult<bool> {
        let repo = self.repo.read().await;
        repo.require(ancestor)?;
        repo.require(descendant)?;
        Ok(repo.reachable(descendant).contains(ancestor))
    }

    async fn checkout(&self, branch: &str) -> IntegrationResult<CommitId> {
        let mut repo = self.repo.write().await;
        let head = repo
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| IntegrationError::repository(format!("branch '{branch}' not found")))?;
        repo.workspace = Some(head.clone());
        Ok(head)
    }

    async fn checkout_commit(&self, commit: &CommitId) -> IntegrationResult<()> {
        let mut repo = self.repo.write().await;
        repo.require(commit)?;
        repo.workspace = Some(commit.clone());
        Ok(())
    }

    async fn cherry_pick(&self, commit: &Commit) -> IntegrationResult<CommitId> {
        let mut repo = self.repo.write().await;
        let head = repo.workspace_head()?;
        let mut tree = repo.tree(Some(&head));
        repo.apply(commit, &mut tree)?;

        let id = repo.store(vec![head], commit.author.clone(), &commit.message, tree);
        repo.workspace = Some(id.clone());
        Ok(id)
    }

    async fn squash(
        &self,
        commits: &[Commit],
        author: &Author,
        message: &str,
    ) -> IntegrationResult<CommitId> {
        let mut repo = self.repo.write().await;
        let head = repo.workspace_head()?;
        let mut tree = repo.tree(Some(&head));
        for commit in commits {
            repo.apply(commit, &mut tree)?;
        }

        let id = repo.store(vec![head], author.clone(), message, tree);
        repo.workspace = Some(id.clone());
        Ok(id)
    }

    async fn push_ref(
        &self,
        branch: &str,
        new_head: &CommitId,
        expected_old: &CommitId,
    ) -> IntegrationResult<()> {
        let mut repo = self.repo.write().await;
        if let Some(message) = repo.push_failure.clone() {
            return Err(IntegrationError::Push {
                branch: branch.to_string(),
                message,
                range: CommitRange::single(new_head.clone()),
            });
        }
        repo.require(new_head)?;
        if repo.branches.get(branch) != Some(expected_old) {
            return Err(IntegrationError::ConcurrentUpdate {
                branch: branch.to_string(),
                expected: expected_old.clone(),
                range: CommitRange::single(new_head.clone()),
            });
        }
        repo.branches.insert(branch.to_string(), new_head.clone());
        Ok(())
    }

    async fn delete_branch(&self, branch: &str, expected: &CommitId) -> IntegrationResult<()> {
        let mut repo = self.repo.write().await;
        if repo.branches.get(branch) != Some(expected) {
            return Err(IntegrationError::ConcurrentUpdate {
                branch: branch.to_string(),
                expected: expected.clone(),
                range: CommitRange::single(expected.clone()),
            });
        }
        repo.branches.remove(branch);
        Ok(())
    }

    async fn reset_workspace(&self) -> IntegrationResult<()> {
        self.repo.write().await.resets += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_commits_hides_excluded_history() {
        let vcs = InMemoryVcs::new();
        let a = vcs.commit("main", "alice", "a", &[("f", "1")]).await;
        let b = vcs.commit("main", "alice", "b", &[("f", "2")]).await;
        let c = vcs.commit("main", "alice", "c", &[("f", "3")]).await;

        let listed: Vec<CommitId> = vcs
            .list_commits("main", &[a.clone()])
            .await
            .unwrap()
            .into_iter()
            .map(|commit| commit.id)
            .collect();
        assert_eq!(listed, vec![c.clone(), b.clone()]);
        assert!(vcs.is_ancestor(&a, &c).await.unwrap());
        assert!(!vcs.is_ancestor(&c, &a).await.unwrap());
    }

    #[tokio::test]
    async fn test_cherry_pick_applies_only_the_commit_change() {
        let vcs = InMemoryVcs::new();
        let base = vcs.commit("main", "alice", "base", &[("f", "1"), ("g", "1")]).await;
        vcs.set_branch("topic", &base).await;
        let change = vcs.commit("topic", "bob", "edit g", &[("g", "2")]).await;
        vcs.commit("main", "alice", "edit f", &[("f", "2")]).await;

        vcs.checkout("main").await.unwrap();
        let source = vcs.commit_details(&change).await.unwrap();
        let picked = vcs.cherry_pick(&source).await.unwrap();

        assert_eq!(vcs.file_at(&picked, "f").await.as_deref(), Some("2"));
        assert_eq!(vcs.file_at(&picked, "g").await.as_deref(), Some("2"));
        assert_eq!(vcs.workspace_head().await, Some(picked));
    }

    #[tokio::test]
    async fn test_push_is_compare_and_swap() {
        let vcs = InMemoryVcs::new();
        let a = vcs.commit("main", "alice", "a", &[("f", "1")]).await;
        let b = vcs.commit("main", "alice", "b", &[("f", "2")]).await;

        let err = vcs.push_ref("main", &a, &a).await.unwrap_err();
        assert!(err.is_retryable());
        vcs.push_ref("main", &a, &b).await.unwrap();
        assert_eq!(vcs.branch_head("main").await, Some(a));
    }
}
