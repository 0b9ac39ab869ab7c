//! Integration strategies.
//!
//! A strategy decides how a candidate range is materialized on top of the
//! target branch and how the result is published:
//!
//! | Strategy      | Objects created          | Published head          |
//! |---------------|--------------------------|-------------------------|
//! | `FastForward` | none                     | last candidate          |
//! | `Squash`      | one synthetic commit     | the squashed commit     |
//! | `Accumulate`  | one commit per candidate | last replayed commit    |
//!
//! Squash and Accumulate replay the first-parent chain of the range. Merge
//! commits are applied against their first parent, so whatever a merge
//! brought in is carried by the merge itself.

use async_trait::async_trait;

use crate::domain::errors::{IntegrationError, IntegrationResult};
use crate::domain::models::{CandidateSet, Commit, CommitId, PreparedState, StrategyKind};
use crate::domain::ports::VcsGateway;

pub mod accumulate;
pub mod fast_forward;
pub mod squash;

pub use accumulate::AccumulateStrategy;
pub use fast_forward::FastForwardStrategy;
pub use squash::SquashStrategy;

/// How a candidate range becomes new history on the target branch.
#[async_trait]
pub trait IntegrationStrategy: Send + Sync {
    /// Materialize `candidates` in the workspace, which is checked out at
    /// `base_head` of `target_branch`.
    async fn prepare(
        &self,
        workspace: &dyn VcsGateway,
        target_branch: &str,
        base_head: &CommitId,
        candidates: &CandidateSet,
    ) -> IntegrationResult<PreparedState>;

    /// Publish the prepared head to the target branch with a
    /// compare-and-swap against the base head. Returns the new target head.
    async fn finalize(
        &self,
        workspace: &dyn VcsGateway,
        prepared: &PreparedState,
    ) -> IntegrationResult<CommitId>;
}

impl StrategyKind {
    /// Strategy implementation for this kind.
    pub fn build(self) -> Box<dyn IntegrationStrategy> {
        match self {
            Self::FastForward => Box::new(FastForwardStrategy),
            Self::Squash => Box::new(SquashStrategy),
            Self::Accumulate => Box::new(AccumulateStrategy),
        }
    }
}

/// Compare-and-swap push shared by every strategy.
pub(crate) async fn push_prepared(
    workspace: &dyn VcsGateway,
    prepared: &PreparedState,
) -> IntegrationResult<CommitId> {
    workspace
        .push_ref(
            &prepared.target_branch,
            &prepared.prepared_head,
            &prepared.base_head,
        )
        .await
        .map_err(|e| e.with_range(&prepared.range))?;
    Ok(prepared.prepared_head.clone())
}

pub(crate) fn require_range(
    candidates: &CandidateSet,
) -> IntegrationResult<crate::domain::models::CommitRange> {
    candidates
        .range()
        .ok_or_else(|| IntegrationError::repository("no candidates to prepare"))
}

/// Message of a squashed commit. A single commit keeps its message as is.
pub fn squash_message(commits: &[&Commit]) -> String {
    if let [only] = commits {
        return only.message.clone();
    }

    let mut message = String::from("Squashed commit of the following:\n");
    for commit in commits {
        message.push_str(&format!(
            "\ncommit {}\nAuthor: {}\n\n",
            commit.id, commit.author
        ));
        for line in commit.message.trim_end().lines() {
            if line.is_empty() {
                message.push('\n');
            } else {
                message.push_str("    ");
                message.push_str(line);
                message.push('\n');
            }
        }
    }
    message
}
