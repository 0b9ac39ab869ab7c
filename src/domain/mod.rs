//! Domain layer for the pretested integration engine
//!
//! This module contains the core models, errors and the port traits the
//! services depend on.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{IntegrationError, IntegrationResult};
