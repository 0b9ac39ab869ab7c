//! Job domain model.
//!
//! A job manages exactly one ready-branch to target-branch pair. Its
//! persistent state is a single [`JobRecord`], read at the start of every
//! cycle and written back when a cycle changes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::commit::CommitId;

/// How candidates are materialized onto the target branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Advance the target ref to the newest candidate, creating no commits.
    FastForward,
    /// Collapse the candidate range into one synthetic commit.
    Squash,
    /// Replay every candidate individually.
    Accumulate,
}

impl Default for StrategyKind {
    fn default() -> Self {
        Self::Squash
    }
}

impl StrategyKind {
    /// Snake-case name as written in config.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FastForward => "fast_forward",
            Self::Squash => "squash",
            Self::Accumulate => "accumulate",
        }
    }

    /// Parse a strategy name; dashes and short forms are accepted.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "fast_forward" | "ff" => Some(Self::FastForward),
            "squash" => Some(Self::Squash),
            "accumulate" | "accumulated" => Some(Self::Accumulate),
            _ => None,
        }
    }
}

/// What an UNSTABLE build verdict means for integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnstablePolicy {
    /// Treat unstable like a failure.
    Fail,
    /// Treat unstable like a success.
    Integrate,
}

impl Default for UnstablePolicy {
    fn default() -> Self {
        Self::Fail
    }
}

/// What happens to a range whose build failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Propose the same range again on the next explicitly triggered cycle.
    Retry,
    /// Exclude the failed range; only newer commits are proposed.
    Skip,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::Retry
    }
}

/// Persistent per-job state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job name, unique per configuration.
    pub job: String,
    /// Branch developers push to.
    pub ready_branch: String,
    /// Protected branch that only receives tested commits.
    pub target_branch: String,
    /// Strategy the job integrates with.
    pub strategy: StrategyKind,
    /// Newest ready-branch commit that has been integrated. `None` until the
    /// first successful integration.
    pub last_integrated: Option<CommitId>,
    /// Head of the newest range whose build failed since the last integration.
    pub rejected_head: Option<CommitId>,
    /// Target head produced by the last successful integration.
    pub last_pushed_head: Option<CommitId>,
    /// Set when the ready branch was deleted after the last integration. A
    /// ready branch recreated afterwards need not contain the marker.
    #[serde(default)]
    pub ready_deleted_at: Option<DateTime<Utc>>,
    /// Last change to the record.
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Fresh record with nothing integrated.
    pub fn new(
        job: impl Into<String>,
        ready_branch: impl Into<String>,
        target_branch: impl Into<String>,
        strategy: StrategyKind,
    ) -> Self {
        Self {
            job: job.into(),
            ready_branch: ready_branch.into(),
            target_branch: target_branch.into(),
            strategy,
            last_integrated: None,
            rejected_head: None,
            last_pushed_head: None,
            ready_deleted_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Record a successful integration. The marker only ever moves forward;
    /// callers guarantee `marker` descends from the previous one.
    pub fn integrated(&mut self, marker: CommitId, pushed_head: CommitId) {
        self.last_integrated = Some(marker);
        self.last_pushed_head = Some(pushed_head);
        self.rejected_head = None;
        self.ready_deleted_at = None;
        self.updated_at = Utc::now();
    }

    /// Record that the ready branch was removed after an integration.
    pub fn ready_branch_deleted(&mut self) {
        let now = Utc::now();
        self.ready_deleted_at = Some(now);
        self.updated_at = now;
    }

    /// Record a failed build for the range ending at `head`.
    pub fn rejected(&mut self, head: CommitId) {
        self.rejected_head = Some(head);
        self.updated_at = Utc::now();
    }
}
