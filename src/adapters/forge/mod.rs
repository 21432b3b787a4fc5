//! Persona discovery against the prompt document store.
//!
//! Personas are prompt documents of type `persona`. Their capabilities live
//! in a `capabilities` section of one of the document's versions, so the
//! client scans versions newest-first until it finds one.

pub mod client;
pub mod models;

pub use client::ForgeClient;
