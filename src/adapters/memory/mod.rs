//! In-memory adapters.
//!
//! `InMemoryVcs` simulates a repository with a workspace and authoritative
//! branches; `InMemoryJobStateRepository` keeps job records in a map. Both
//! back the service tests and let hosts dry-run the controller.

pub mod job_state;
pub mod vcs;

pub use job_state::InMemoryJobStateRepository;
pub use vcs::InMemoryVcs;
