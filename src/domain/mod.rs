//! Domain layer for the stage-gate system
//!
//! This module contains core business models, errors and port traits.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
