//! Integration attempt domain model.
//!
//! An attempt lives for exactly one cycle: it is created when a workspace has
//! been prepared and discarded once the build verdict has been handled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::commit::{CandidateSet, CommitId, CommitRange};
use super::job::{JobRecord, StrategyKind, UnstablePolicy};

/// Verdict of the external build. Never produced by the engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildVerdict {
    /// All tests passed.
    Success,
    /// The build or its tests failed.
    Failure,
    /// The build passed with test failures the host tolerates.
    Unstable,
}

impl BuildVerdict {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Unstable => "unstable",
        }
    }

    /// Parse a lowercase name.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            "unstable" => Some(Self::Unstable),
            _ => None,
        }
    }

    /// Whether this verdict allows integration under the given policy.
    pub fn integrates(&self, policy: UnstablePolicy) -> bool {
        match self {
            Self::Success => true,
            Self::Failure => false,
            Self::Unstable => policy == UnstablePolicy::Integrate,
        }
    }
}

impl fmt::Display for BuildVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workspace state produced by a strategy's prepare step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedState {
    /// Branch the prepared head will be pushed to.
    pub target_branch: String,
    /// Target head observed when the workspace was prepared. The push in
    /// finalize only succeeds if the target still points here.
    pub base_head: CommitId,
    /// Commit the target branch will point to after finalize.
    pub prepared_head: CommitId,
    /// Commit objects created while preparing, oldest first. Empty for
    /// fast-forward.
    pub created: Vec<CommitId>,
    /// Candidates the prepared head contains.
    pub range: CommitRange,
}

/// One in-flight integration.
#[derive(Debug, Clone)]
pub struct IntegrationAttempt {
    /// Unique id for log correlation.
    pub id: Uuid,
    /// Job record as read at selection time.
    pub record: JobRecord,
    /// Commits under test.
    pub candidates: CandidateSet,
    /// Strategy that prepared the workspace.
    pub strategy: StrategyKind,
    /// Result of preparation.
    pub prepared: PreparedState,
    /// Ready-branch head observed at selection time.
    pub ready_head: CommitId,
    /// When the attempt was prepared.
    pub started_at: DateTime<Utc>,
}

impl IntegrationAttempt {
    /// Range under test.
    pub fn range(&self) -> &CommitRange {
        &self.prepared.range
    }
}

/// Outcome of handling a build verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeResult {
    /// Whether the range reached the target.
    pub integrated: bool,
    /// New target head when integrated.
    pub new_head: Option<CommitId>,
    /// Marker after the cycle.
    pub marker: Option<CommitId>,
    /// Verdict that was handled.
    pub verdict: BuildVerdict,
    /// Range that was built.
    pub range: CommitRange,
}

/// States of the integration controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    /// No attempt in flight.
    Idle,
    /// Computing candidates.
    Selecting,
    /// Preparing the workspace.
    Preparing,
    /// Prepared; waiting for the build verdict.
    AwaitingBuild,
    /// Handling the verdict.
    Finalizing,
}

impl ControllerState {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Selecting => "selecting",
            Self::Preparing => "preparing",
            Self::AwaitingBuild => "awaiting_build",
            Self::Finalizing => "finalizing",
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer of the build-start hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStart {
    /// Whether the host should run the build.
    pub proceed: bool,
    /// Commit the workspace was prepared at.
    pub prepared_ref: Option<CommitId>,
    /// Range under test.
    pub range: Option<CommitRange>,
}

impl BuildStart {
    /// Nothing to integrate.
    pub fn no_work() -> Self {
        Self {
            proceed: false,
            prepared_ref: None,
            range: None,
        }
    }
}

/// Answer of the build-complete hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildCompletion {
    /// Whether the host should schedule another cycle.
    pub retrigger: bool,
    /// How the verdict was applied.
    pub result: FinalizeResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_integration_policy() {
        assert!(BuildVerdict::Success.integrates(UnstablePolicy::Fail));
        assert!(!BuildVerdict::Failure.integrates(UnstablePolicy::Integrate));
        assert!(!BuildVerdict::Unstable.integrates(UnstablePolicy::Fail));
        assert!(BuildVerdict::Unstable.integrates(UnstablePolicy::Integrate));
    }

    #[test]
    fn test_verdict_parse() {
        assert_eq!(BuildVerdict::from_str("SUCCESS"), Some(BuildVerdict::Success));
        assert_eq!(BuildVerdict::from_str("aborted"), None);
    }

    #[test]
    fn test_build_start_no_work() {
        let start = BuildStart::no_work();
        assert!(!start.proceed);
        assert!(start.prepared_ref.is_none());
    }
}
