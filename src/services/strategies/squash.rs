//! Squash strategy: the whole range becomes one commit on the target.

use async_trait::async_trait;
use tracing::debug;

use super::{push_prepared, require_range, squash_message, IntegrationStrategy};
use crate::domain::errors::{IntegrationError, IntegrationResult};
use crate::domain::models::{CandidateSet, Commit, CommitId, PreparedState};
use crate::domain::ports::VcsGateway;

/// Collapses the candidates into one commit by the last author.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquashStrategy;

#[async_trait]
impl IntegrationStrategy for SquashStrategy {
    async fn prepare(
        &self,
        workspace: &dyn VcsGateway,
        target_branch: &str,
        base_head: &CommitId,
        candidates: &CandidateSet,
    ) -> IntegrationResult<PreparedState> {
        let range = require_range(candidates)?;
        let author = candidates
            .attributed_author()
            .ok_or_else(|| IntegrationError::repository("no candidates to prepare"))?;

        let chain = candidates.first_parent_chain();
        let message = squash_message(&chain);
        let commits: Vec<Commit> = chain.into_iter().cloned().collect();

        let squashed = workspace
            .squash(&commits, author, &message)
            .await
            .map_err(|e| e.with_range(&range))?;
        debug!(
            branch = target_branch,
            commit = %squashed.short(),
            author = %author,
            "Squashed {} commits",
            commits.len()
        );

        Ok(PreparedState {
            target_branch: target_branch.to_string(),
            base_head: base_head.clone(),
            prepared_head: squashed.clone(),
            created: vec![squashed],
            range,
        })
    }

    async fn finalize(
        &self,
        workspace: &dyn VcsGateway,
        prepared: &PreparedState,
    ) -> IntegrationResult<CommitId> {
        push_prepared(workspace, prepared).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryVcs;

    #[tokio::test]
    async fn test_squash_author_is_last_candidate() {
        let vcs = InMemoryVcs::new();
        let m = vcs.commit("master", "alice", "base", &[("a.txt", "1")]).await;
        vcs.set_branch("ready", &m).await;
        vcs.commit("ready", "bob", "x", &[("b.txt", "1")]).await;
        vcs.commit("ready", "carol", "y", &[("c.txt", "1")]).await;

        let candidates = CandidateSet::new(vcs.log_since("ready", &m).await);
        let base = vcs.checkout("master").await.unwrap();
        let prepared = SquashStrategy
            .prepare(&vcs, "master", &base, &candidates)
            .await
            .unwrap();

        assert_eq!(prepared.created.len(), 1);
        let squashed = vcs.commit_details(&prepared.prepared_head).await.unwrap();
        assert_eq!(squashed.author.name, "carol");
        assert_eq!(squashed.parents, vec![base]);
        assert!(squashed.message.contains("Author: bob <bob@example.com>"));
        assert_eq!(
            vcs.file_at(&prepared.prepared_head, "b.txt").await.as_deref(),
            Some("1")
        );
        assert_eq!(
            vcs.file_at(&prepared.prepared_head, "c.txt").await.as_deref(),
            Some("1")
        );
    }

    #[tokio::test]
    async fn test_squash_conflict_reports_whole_range() {
        let vcs = InMemoryVcs::new();
        let m = vcs.commit("master", "alice", "base", &[("a.txt", "1")]).await;
        vcs.set_branch("ready", &m).await;
        vcs.commit("ready", "bob", "x", &[("a.txt", "2")]).await;
        vcs.commit("ready", "carol", "y", &[("c.txt", "1")]).await;
        vcs.commit("master", "alice", "hotfix", &[("a.txt", "3")]).await;

        let candidates = CandidateSet::new(vcs.log_since("ready", &m).await);
        let base = vcs.checkout("master").await.unwrap();
        let err = SquashStrategy
            .prepare(&vcs, "master", &base, &candidates)
            .await
            .unwrap_err();

        match err {
            IntegrationError::Conflict { range, files, .. } => {
                assert_eq!(range.count, 2);
                assert_eq!(files, vec!["a.txt".to_string()]);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }
}
