//! Stagegate: stage-gated workflow for backlog items.
//!
//! Items move through an ordered stage template one step at a time. Leaving
//! a stage requires its gate criteria to be satisfied, unless the advance is
//! forced with a recorded reason. Transitions are published to a notifier
//! asynchronously, and agent personas can be discovered by capability from a
//! prompt document store.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;
