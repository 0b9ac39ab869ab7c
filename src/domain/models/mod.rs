//! Domain models for the integration engine.

pub mod attempt;
pub mod commit;
pub mod config;
pub mod job;

pub use attempt::{
    BuildCompletion, BuildStart, BuildVerdict, ControllerState, FinalizeResult,
    IntegrationAttempt, PreparedState,
};
pub use commit::{Author, CandidateSet, Commit, CommitId, CommitRange};
pub use config::{Config, DatabaseConfig, JobConfig, LoggingConfig};
pub use job::{FailurePolicy, JobRecord, StrategyKind, UnstablePolicy};
