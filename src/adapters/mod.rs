//! Adapters implementing the domain ports.

pub mod git;
pub mod memory;
pub mod sqlite;
