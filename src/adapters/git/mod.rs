//! Git adapter: [`VcsGateway`](crate::domain::ports::VcsGateway) over the
//! `git` executable.

pub mod branch_name;
pub mod gateway;

pub use branch_name::{validate_branch_name, InvalidBranchName};
pub use gateway::GitCliGateway;
