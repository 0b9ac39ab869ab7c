//! Integration services: candidate selection, workspace preparation,
//! outcome handling and the controller that drives a cycle.

pub mod commit_queue;
pub mod integration_controller;
pub mod outcome_handler;
pub mod strategies;
pub mod workspace_preparer;

pub use commit_queue::CommitQueue;
pub use integration_controller::IntegrationController;
pub use outcome_handler::BuildOutcomeHandler;
pub use strategies::IntegrationStrategy;
pub use workspace_preparer::WorkspacePreparer;
