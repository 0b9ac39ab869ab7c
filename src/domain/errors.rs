//! Domain errors for the integration engine.

use thiserror::Error;

use crate::domain::models::{CommitId, CommitRange};

fn format_range(range: Option<&CommitRange>) -> String {
    range.map_or_else(|| "no candidates".to_string(), ToString::to_string)
}

fn format_files(files: &[String]) -> String {
    if files.is_empty() {
        "unknown paths".to_string()
    } else {
        files.join(", ")
    }
}

/// Errors raised while selecting, preparing or finalizing an integration.
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// The ready branch no longer contains the last integrated commit.
    #[error(
        "History diverged on '{branch}': last integrated commit {marker} is not an ancestor of {head}"
    )]
    HistoryDiverged {
        branch: String,
        marker: CommitId,
        head: CommitId,
    },

    /// Applying a candidate conflicted with the target.
    #[error("Conflict applying {commit} for {range}: {}", format_files(.files))]
    Conflict {
        range: CommitRange,
        commit: CommitId,
        files: Vec<String>,
    },

    /// The repository or workspace is unusable.
    #[error("Repository error ({}): {message}", format_range(.range.as_ref()))]
    Repository {
        message: String,
        range: Option<CommitRange>,
    },

    /// The target is not an ancestor of the ready head.
    #[error("Cannot fast-forward '{target}' to {range}: target has diverged")]
    NotFastForwardable { target: String, range: CommitRange },

    /// The target moved between preparation and push.
    #[error("Concurrent update of '{branch}' while integrating {range}: expected {expected}")]
    ConcurrentUpdate {
        branch: String,
        expected: CommitId,
        range: CommitRange,
    },

    /// The push was refused for another reason.
    #[error("Push to '{branch}' failed for {range}: {message}")]
    Push {
        branch: String,
        message: String,
        range: CommitRange,
    },

    /// A build was started while one is in flight.
    #[error("Job '{job}' already has an integration attempt in flight ({state})")]
    AttemptInProgress {
        job: String,
        state: String,
        range: Option<CommitRange>,
    },

    /// A verdict arrived with no attempt in flight.
    #[error("Job '{job}' has no integration attempt in flight")]
    NoActiveAttempt { job: String },

    /// Reading or writing the job record failed.
    #[error("Job state storage error: {0}")]
    Storage(String),
}

/// Result type used throughout the engine.
pub type IntegrationResult<T> = Result<T, IntegrationError>;

impl IntegrationError {
    /// Repository failure not tied to a range yet.
    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
            range: None,
        }
    }

    /// Scope an error raised by a gateway to the attempt's full range.
    /// Gateways only know the single commit they were working on.
    #[must_use]
    pub fn with_range(self, attempt: &CommitRange) -> Self {
        let range = attempt.clone();
        match self {
            Self::Repository { message, .. } => Self::Repository {
                message,
                range: Some(range),
            },
            Self::Conflict { commit, files, .. } => Self::Conflict {
                range,
                commit,
                files,
            },
            Self::NotFastForwardable { target, .. } => Self::NotFastForwardable { target, range },
            Self::ConcurrentUpdate {
                branch, expected, ..
            } => Self::ConcurrentUpdate {
                branch,
                expected,
                range,
            },
            Self::Push {
                branch, message, ..
            } => Self::Push {
                branch,
                message,
                range,
            },
            other => other,
        }
    }

    /// Range of commits the error concerns, when known.
    pub fn range(&self) -> Option<&CommitRange> {
        match self {
            Self::Conflict { range, .. }
            | Self::NotFastForwardable { range, .. }
            | Self::ConcurrentUpdate { range, .. }
            | Self::Push { range, .. } => Some(range),
            Self::Repository { range, .. } | Self::AttemptInProgress { range, .. } => {
                range.as_ref()
            }
            Self::HistoryDiverged { .. } | Self::NoActiveAttempt { .. } | Self::Storage(_) => {
                None
            }
        }
    }

    /// Errors an operator has to look at before the job can make progress.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Repository { .. }
                | Self::HistoryDiverged { .. }
                | Self::AttemptInProgress { .. }
                | Self::NoActiveAttempt { .. }
                | Self::Storage(_)
        )
    }

    /// Errors resolved by re-running the whole cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentUpdate { .. })
    }

    /// Errors raised before any build ran.
    pub fn is_preparation_failure(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::NotFastForwardable { .. } | Self::HistoryDiverged { .. }
        )
    }
}

impl From<sqlx::Error> for IntegrationError {
    fn from(err: sqlx::Error) -> Self {
        IntegrationError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for IntegrationError {
    fn from(err: serde_json::Error) -> Self {
        IntegrationError::Storage(err.to_string())
    }
}
