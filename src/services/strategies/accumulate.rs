//! Accumulate strategy: every candidate is replayed as its own commit.

use async_trait::async_trait;
use tracing::debug;

use super::{push_prepared, require_range, IntegrationStrategy};
use crate::domain::errors::IntegrationResult;
use crate::domain::models::{CandidateSet, CommitId, PreparedState};
use crate::domain::ports::VcsGateway;

/// Replays every candidate as its own commit.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccumulateStrategy;

#[async_trait]
impl IntegrationStrategy for AccumulateStrategy {
    async fn prepare(
        &self,
        workspace: &dyn VcsGateway,
        target_branch: &str,
        base_head: &CommitId,
        candidates: &CandidateSet,
    ) -> IntegrationResult<PreparedState> {
        let range = require_range(candidates)?;

        let mut created = Vec::with_capacity(candidates.len());
        for commit in candidates.first_parent_chain() {
            let replayed = workspace
                .cherry_pick(commit)
                .await
                .map_err(|e| e.with_range(&range))?;
            debug!(source = %commit.id.short(), replayed = %replayed.short(), "Replayed commit");
            created.push(replayed);
        }

        let prepared_head = created
            .last()
            .cloned()
            .unwrap_or_else(|| base_head.clone());

        Ok(PreparedState {
            target_branch: target_branch.to_string(),
            base_head: base_head.clone(),
            prepared_head,
            created,
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
