//! Build outcome handling.
//!
//! Turns a build verdict into either a published target head plus an
//! advanced marker, or a discarded workspace with the marker untouched.
//! The marker is written only after the push went through.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::domain::errors::IntegrationResult;
use crate::domain::models::{BuildVerdict, FinalizeResult, IntegrationAttempt, UnstablePolicy};
use crate::domain::ports::{JobStateRepository, VcsGateway};

/// Applies a build verdict to a prepared attempt.
///
/// On a passing verdict the prepared head is pushed and the job record
/// advanced; otherwise the record only notes the rejected head. Either way
/// the workspace is reset afterwards.
pub struct BuildOutcomeHandler {
    vcs: Arc<dyn VcsGateway>,
    records: Arc<dyn JobStateRepository>,
    unstable_policy: UnstablePolicy,
    delete_ready_branch: bool,
}

impl BuildOutcomeHandler {
    /// Create a handler that fails unstable builds and keeps the ready branch.
    pub fn new(vcs: Arc<dyn VcsGateway>, records: Arc<dyn JobStateRepository>) -> Self {
        Self {
            vcs,
            records,
            unstable_policy: UnstablePolicy::default(),
            delete_ready_branch: false,
        }
    }

    /// Set how an unstable verdict is treated.
    #[must_use]
    pub fn with_unstable_policy(mut self, policy: UnstablePolicy) -> Self {
        self.unstable_policy = policy;
        self
    }

    /// Delete the ready branch after each successful integration.
    #[must_use]
    pub fn with_delete_ready_branch(mut self, delete: bool) -> Self {
        self.delete_ready_branch = delete;
        self
    }

    /// Commit or roll back `attempt` according to `verdict`.
    #[instrument(skip(self, attempt), fields(job = %attempt.record.job, range = %attempt.range()))]
    pub async fn finalize(
        &self,
        attempt: &IntegrationAttempt,
        verdict: BuildVerdict,
    ) -> IntegrationResult<FinalizeResult> {
        let result = if verdict.integrates(self.unstable_policy) {
            self.integrate(attempt, verdict).await
        } else {
            self.reject(attempt, verdict).await
        };

        if let Err(err) = self.vcs.reset_workspace().await {
            warn!(error = %err, "Workspace reset failed");
        }
        result
    }

    async fn integrate(
        &self,
        attempt: &IntegrationAttempt,
        verdict: BuildVerdict,
    ) -> IntegrationResult<FinalizeResult> {
        let range = attempt.range().clone();
        let strategy = attempt.strategy.build();

        let new_head = match strategy.finalize(self.vcs.as_ref(), &attempt.prepared).await {
            Ok(head) => head,
            Err(err) => {
                warn!(error = %err, "Publishing the prepared head failed, marker unchanged");
                return Err(err);
            }
        };

        let marker = range.last.clone();
        let mut record = attempt.record.clone();
        record.integrated(marker.clone(), new_head.clone());
        self.records.save(&record).await?;

        info!(
            branch = %attempt.prepared.target_branch,
            head = %new_head.short(),
            verdict = %verdict,
            "Integrated {range}"
        );

        if self.delete_ready_branch && self.delete_ready_branch(attempt).await {
            record.ready_branch_deleted();
            self.records.save(&record).await?;
        }

        Ok(FinalizeResult {
            integrated: true,
            new_head: Some(new_head),
            marker: Some(marker),
            verdict,
            range,
        })
    }

    async fn reject(
        &self,
        attempt: &IntegrationAttempt,
        verdict: BuildVerdict,
    ) -> IntegrationResult<FinalizeResult> {
        let range = attempt.range().clone();
        let mut record = attempt.record.clone();
        record.rejected(range.last.clone());
        self.records.save(&record).await?;

        info!(verdict = %verdict, "Build did not pass, discarded {range}");

        Ok(FinalizeResult {
            integrated: false,
            new_head: None,
            marker: record.last_integrated,
            verdict,
            range,
        })
    }

    /// Remove the ready branch if nothing was pushed to it since the attempt
    /// was prepared. Returns whether it was removed.
    async fn delete_ready_branch(&self, attempt: &IntegrationAttempt) -> bool {
        let branch = &attempt.record.ready_branch;
        match self.vcs.delete_branch(branch, &attempt.ready_head).await {
            Ok(()) => {
                info!(branch = %branch, "Deleted integrated ready branch");
                true
            }
            Err(err) => {
                warn!(branch = %branch, error = %err, "Ready branch kept");
                false
            }
        }
    }
}
