//! Workspace preparation.
//!
//! Checks out the target branch fresh and hands the workspace to the job's
//! strategy. Any failure leaves the workspace reset.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::domain::errors::{IntegrationError, IntegrationResult};
use crate::domain::models::{CandidateSet, PreparedState};
use crate::domain::ports::VcsGateway;
use crate::services::strategies::IntegrationStrategy;

/// Puts the workspace in the state a build should test.
pub struct WorkspacePreparer {
    vcs: Arc<dyn VcsGateway>,
}

impl WorkspacePreparer {
    /// Create a preparer working through `vcs`.
    pub fn new(vcs: Arc<dyn VcsGateway>) -> Self {
        Self { vcs }
    }

    /// Materialize `candidates` on top of `target_branch`.
    ///
    /// Re-entrant: leftover state from an interrupted attempt is discarded by
    /// the fresh checkout.
    #[instrument(skip(self, strategy, candidates), fields(range))]
    pub async fn prepare(
        &self,
        target_branch: &str,
        strategy: &dyn IntegrationStrategy,
        candidates: &CandidateSet,
    ) -> IntegrationResult<PreparedState> {
        let range = candidates
            .range()
            .ok_or_else(|| IntegrationError::repository("no candidates to prepare"))?;
        tracing::Span::current().record("range", tracing::field::display(&range));

        let result = async {
            let base_head = self.vcs.checkout(target_branch).await?;
            strategy
                .prepare(self.vcs.as_ref(), target_branch, &base_head, candidates)
                .await
        }
        .await;

        match result {
            Ok(prepared) => {
                info!(
                    branch = target_branch,
                    base = %prepared.base_head.short(),
                    head = %prepared.prepared_head.short(),
                    created = prepared.created.len(),
                    "Workspace prepared"
                );
                Ok(prepared)
            }
            Err(err) => {
                let err = classify(err).with_range(&range);
                warn!(error = %err, "Preparation failed, resetting workspace");
                if let Err(reset_err) = self.vcs.reset_workspace().await {
                    warn!(error = %reset_err, "Workspace reset failed");
                }
                Err(err)
            }
        }
    }
}

/// Conflicts and non-fast-forwardable targets keep their identity; every
/// other gateway failure during preparation is a repository fault.
fn classify(err: IntegrationError) -> IntegrationError {
    match err {
        IntegrationError::Conflict { .. }
        | IntegrationError::NotFastForwardable { .. }
        | IntegrationError::Repository { .. } => err,
        other => IntegrationError::repository(other.to_string()),
    }
}
