//! Pretested - pretested integration engine
//!
//! Commits pushed to a job's ready branch are collected, prepared on top of
//! the target branch with a configurable strategy, handed to an external
//! build, and published to the target branch only when that build passes.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and the ports adapters implement
//! - **Service Layer** (`services`): commit queue, strategies, workspace
//!   preparation, outcome handling and the integration controller
//! - **Adapters** (`adapters`): git CLI, `SQLite` and in-memory implementations of the ports
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): a local host that runs build commands between the hooks
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pretested::adapters::git::GitCliGateway;
//! use pretested::adapters::memory::InMemoryJobStateRepository;
//! use pretested::domain::models::{BuildVerdict, JobConfig};
//! use pretested::services::IntegrationController;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let job = JobConfig::new("core", "/srv/ci/core");
//!     let vcs = Arc::new(GitCliGateway::new(&job.workspace, &job.remote));
//!     let records = Arc::new(InMemoryJobStateRepository::new());
//!     let mut controller = IntegrationController::new(&job, vcs, records);
//!
//!     if controller.on_build_start().await?.proceed {
//!         let completion = controller.on_build_complete(BuildVerdict::Success).await?;
//!         println!("retrigger: {}", completion.retrigger);
//!     }
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{IntegrationError, IntegrationResult};
pub use domain::models::{
    BuildVerdict, CandidateSet, Commit, CommitId, CommitRange, Config, FailurePolicy, JobConfig,
    JobRecord, StrategyKind, UnstablePolicy,
};
pub use domain::ports::{JobStateRepository, VcsGateway};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::IntegrationController;
