//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that adapters must implement:
//! - VcsGateway: operations against the backing repository and workspace
//! - JobStateRepository: persistence of per-job records
//!
//! These traits keep the integration services independent of git and of
//! the storage engine.

pub mod job_state_repository;
pub mod vcs_gateway;

pub use job_state_repository::JobStateRepository;
pub use vcs_gateway::VcsGateway;
