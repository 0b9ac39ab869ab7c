//! Fast-forward strategy: the target moves to the last candidate.

use async_trait::async_trait;
use tracing::debug;

use super::{push_prepared, require_range, IntegrationStrategy};
use crate::domain::errors::{IntegrationError, IntegrationResult};
use crate::domain::models::{CandidateSet, CommitId, PreparedState};
use crate::domain::ports::VcsGateway;

/// Publishes the ready head itself when the target is its ancestor.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastForwardStrategy;

#[async_trait]
impl IntegrationStrategy for FastForwardStrategy {
    async fn prepare(
        &self,
        workspace: &dyn VcsGateway,
        target_branch: &str,
        base_head: &CommitId,
        candidates: &CandidateSet,
    ) -> IntegrationResult<PreparedState> {
        let range = require_range(candidates)?;
        let last = range.last.clone();

        if !workspace.is_ancestor(base_head, &last).await? {
            return Err(IntegrationError::NotFastForwardable {
                target: target_branch.to_string(),
                range,
            });
        }

        workspace.checkout_commit(&last).await?;
        debug!(branch = target_branch, head = %last.short(), "Workspace fast-forwarded");

        Ok(PreparedState {
            target_branch: target_branch.to_string(),
            base_head: base_head.clone(),
            prepared_head: last,
            created: Vec::new(),
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
