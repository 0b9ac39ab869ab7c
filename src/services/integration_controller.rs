//! Integration controller.
//!
//! Drives one job through its cycle:
//!
//! ```text
//! Idle -> Selecting -> Preparing -> AwaitingBuild -> Finalizing -> Idle
//! ```
//!
//! The host calls [`IntegrationController::on_build_start`] before running a
//! build and [`IntegrationController::on_build_complete`] with the verdict
//! afterwards. Between the two calls the controller holds only the prepared
//! state; the build itself is never run from here.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{IntegrationError, IntegrationResult};
use crate::domain::models::{
    BuildCompletion, BuildStart, BuildVerdict, CandidateSet, ControllerState, FailurePolicy,
    FinalizeResult, IntegrationAttempt, JobConfig, JobRecord, StrategyKind,
};
use crate::domain::ports::{JobStateRepository, VcsGateway};
use crate::services::commit_queue::CommitQueue;
use crate::services::outcome_handler::BuildOutcomeHandler;
use crate::services::workspace_preparer::WorkspacePreparer;

/// Drives the integration cycle of one job.
///
/// A host calls [`on_build_start`](Self::on_build_start) before its build
/// and [`on_build_complete`](Self::on_build_complete) with the verdict
/// afterwards. Between the two calls the controller only holds the prepared
/// attempt; the job record is read and written through the repository.
///
/// One controller serves one job. Hooks take `&mut self`, so a second start
/// while an attempt is in flight is rejected instead of raced.
pub struct IntegrationController {
    job: String,
    ready_branch: String,
    target_branch: String,
    strategy: StrategyKind,
    failure_policy: FailurePolicy,
    vcs: Arc<dyn VcsGateway>,
    records: Arc<dyn JobStateRepository>,
    queue: CommitQueue,
    preparer: WorkspacePreparer,
    handler: BuildOutcomeHandler,
    state: ControllerState,
    attempt: Option<IntegrationAttempt>,
}

impl IntegrationController {
    /// Create a controller for `job`, backed by `vcs` and `records`.
    pub fn new(
        config: &JobConfig,
        vcs: Arc<dyn VcsGateway>,
        records: Arc<dyn JobStateRepository>,
    ) -> Self {
        let handler = BuildOutcomeHandler::new(vcs.clone(), records.clone())
            .with_unstable_policy(config.unstable_policy)
            .with_delete_ready_branch(config.delete_ready_branch);

        Self {
            job: config.name.clone(),
            ready_branch: config.ready_branch.clone(),
            target_branch: config.target_branch.clone(),
            strategy: config.strategy,
            failure_policy: config.failure_policy,
            queue: CommitQueue::new(vcs.clone()),
            preparer: WorkspacePreparer::new(vcs.clone()),
            handler,
            vcs,
            records,
            state: ControllerState::Idle,
            attempt: None,
        }
    }

    /// Name of the job this controller serves.
    pub fn job(&self) -> &str {
        &self.job
    }

    /// Current state of the cycle.
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// The attempt awaiting its build verdict, if any.
    pub fn attempt(&self) -> Option<&IntegrationAttempt> {
        self.attempt.as_ref()
    }

    /// Select the next candidate range and prepare the workspace for it.
    ///
    /// Returns `proceed: false` when there is nothing to integrate. Errors
    /// leave the controller idle with no attempt.
    #[instrument(skip(self), fields(job = %self.job, strategy = self.strategy.as_str()))]
    pub async fn on_build_start(&mut self) -> IntegrationResult<BuildStart> {
        if self.state != ControllerState::Idle {
            return Err(IntegrationError::AttemptInProgress {
                job: self.job.clone(),
                state: self.state.to_string(),
                range: self.attempt.as_ref().map(|a| a.range().clone()),
            });
        }

        match self.select_and_prepare().await {
            Ok(start) => Ok(start),
            Err(err) => {
                warn!(error = %err, "Build start aborted");
                self.state = ControllerState::Idle;
                self.attempt = None;
                Err(err)
            }
        }
    }

    async fn select_and_prepare(&mut self) -> IntegrationResult<BuildStart> {
        self.state = ControllerState::Selecting;
        let record = self.load_record().await?;
        let candidates = self
            .queue
            .next_candidates(&record, self.failure_policy)
            .await?;

        let Some(range) = candidates.range() else {
            info!("No untested commits on '{}'", self.ready_branch);
            self.state = ControllerState::Idle;
            return Ok(BuildStart::no_work());
        };
        info!(range = %range, "Selected candidates");

        self.state = ControllerState::Preparing;
        let strategy = self.strategy.build();
        let prepared = self
            .preparer
            .prepare(&self.target_branch, strategy.as_ref(), &candidates)
            .await?;

        let prepared_ref = prepared.prepared_head.clone();
        self.attempt = Some(IntegrationAttempt {
            id: Uuid::new_v4(),
            record,
            strategy: self.strategy,
            ready_head: range.last.clone(),
            prepared,
            candidates,
            started_at: Utc::now(),
        });
        self.state = ControllerState::AwaitingBuild;

        Ok(BuildStart {
            proceed: true,
            prepared_ref: Some(prepared_ref),
            range: Some(range),
        })
    }

    /// Publish or discard the in-flight attempt and decide whether another
    /// cycle is due.
    #[instrument(skip(self), fields(job = %self.job, verdict = %verdict))]
    pub async fn on_build_complete(
        &mut self,
        verdict: BuildVerdict,
    ) -> IntegrationResult<BuildCompletion> {
        if self.state != ControllerState::AwaitingBuild {
            return Err(IntegrationError::NoActiveAttempt {
                job: self.job.clone(),
            });
        }
        let Some(attempt) = self.attempt.take() else {
            self.state = ControllerState::Idle;
            return Err(IntegrationError::NoActiveAttempt {
                job: self.job.clone(),
            });
        };

        self.state = ControllerState::Finalizing;
        let finalized = self.handler.finalize(&attempt, verdict).await;
        self.state = ControllerState::Idle;

        let result = finalized?;
        let retrigger = self.should_retrigger(&result).await;
        Ok(BuildCompletion { retrigger, result })
    }

    /// Drop the in-flight attempt without touching the target branch.
    #[instrument(skip(self), fields(job = %self.job))]
    pub async fn cancel(&mut self) -> IntegrationResult<()> {
        self.state = ControllerState::Idle;
        if let Some(attempt) = self.attempt.take() {
            info!(range = %attempt.range(), "Attempt cancelled");
            self.vcs.reset_workspace().await?;
        }
        Ok(())
    }

    /// Candidates the next cycle would pick up, without preparing anything.
    pub async fn pending_candidates(&self) -> IntegrationResult<CandidateSet> {
        let record = self.load_record().await?;
        self.queue
            .next_candidates(&record, self.failure_policy)
            .await
    }

    /// Another cycle is due when commits beyond the finished range wait on
    /// the ready branch. A rejected range never schedules itself again.
    async fn should_retrigger(&self, result: &FinalizeResult) -> bool {
        let pending = match self.load_record().await {
            Ok(record) => {
                self.queue
                    .compute_candidates(&record, record.rejected_head.as_ref())
                    .await
            }
            Err(err) => Err(err),
        };

        match pending {
            Ok(pending) if pending.is_empty() => {
                debug!(range = %result.range, "No newer candidates");
                false
            }
            Ok(pending) => {
                info!(pending = pending.len(), "Triggering new build");
                true
            }
            Err(err) => {
                // the next start reports the error to the host
                warn!(error = %err, "Re-evaluating candidates failed");
                true
            }
        }
    }

    async fn load_record(&self) -> IntegrationResult<JobRecord> {
        let record = match self.records.get(&self.job).await? {
            Some(mut record) => {
                record.ready_branch.clone_from(&self.ready_branch);
                record.target_branch.clone_from(&self.target_branch);
                record.strategy = self.strategy;
                record
            }
            None => JobRecord::new(
                &self.job,
                &self.ready_branch,
                &self.target_branch,
                self.strategy,
            ),
        };
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryJobStateRepository, InMemoryVcs};

    async fn setup(strategy: StrategyKind) -> (IntegrationController, Arc<InMemoryVcs>) {
        let vcs = Arc::new(InMemoryVcs::new());
        let m = vcs.commit("master", "alice", "base", &[("a.txt", "1")]).await;
        vcs.set_branch("ready", &m).await;
        vcs.commit("ready", "bob", "x", &[("b.txt", "1")]).await;

        let mut config = JobConfig::new("core", "/tmp/ws");
        config.strategy = strategy;
        let records = Arc::new(InMemoryJobStateRepository::new());
        (IntegrationController::new(&config, vcs.clone(), records), vcs)
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let (mut controller, _vcs) = setup(StrategyKind::Squash).await;

        let start = controller.on_build_start().await.unwrap();
        assert!(start.proceed);
        assert_eq!(controller.state(), ControllerState::AwaitingBuild);

        let err = controller.on_build_start().await.unwrap_err();
        assert!(matches!(err, IntegrationError::AttemptInProgress { .. }));
        assert_eq!(controller.state(), ControllerState::AwaitingBuild);
        assert!(controller.attempt().is_some());
    }

    #[tokio::test]
    async fn test_complete_without_start() {
        let (mut controller, _vcs) = setup(StrategyKind::Squash).await;
        let err = controller
            .on_build_complete(BuildVerdict::Success)
            .await
            .unwrap_err();
        assert!(matches!(err, IntegrationError::NoActiveAttempt { .. }));
    }

    #[tokio::test]
    async fn test_empty_candidates_is_no_op() {
        let (mut controller, vcs) = setup(StrategyKind::Squash).await;
        let start = controller.on_build_start().await.unwrap();
        controller
            .on_build_complete(BuildVerdict::Success)
            .await
            .unwrap();
        assert!(start.proceed);

        let before = vcs.branch_head("master").await;
        let start = controller.on_build_start().await.unwrap();
        assert!(!start.proceed);
        assert_eq!(controller.state(), ControllerState::Idle);
        assert_eq!(vcs.branch_head("master").await, before);
    }

    #[tokio::test]
    async fn test_cancel_returns_to_idle() {
        let (mut controller, vcs) = setup(StrategyKind::Accumulate).await;
        let before = vcs.branch_head("master").await;

        controller.on_build_start().await.unwrap();
        controller.cancel().await.unwrap();

        assert_eq!(controller.state(), ControllerState::Idle);
        assert!(controller.attempt().is_none());
        assert_eq!(vcs.branch_head("master").await, before);
        assert!(controller.on_build_start().await.unwrap().proceed);
    }

    #[tokio::test]
    async fn test_preparation_failure_leaves_controller_idle() {
        let (mut controller, vcs) = setup(StrategyKind::FastForward).await;
        vcs.commit("master", "alice", "hotfix", &[("h.txt", "1")]).await;

        let err = controller.on_build_start().await.unwrap_err();
        assert!(matches!(err, IntegrationError::NotFastForwardable { .. }));
        assert_eq!(controller.state(), ControllerState::Idle);
        assert!(controller.attempt().is_none());
    }
}
