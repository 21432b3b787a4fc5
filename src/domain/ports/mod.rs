//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces that infrastructure adapters implement:
//! - BacklogRepository: persistence of items and gate criteria
//! - TransitionNotifier: outbound delivery of transition events
//! - PersonaDirectory: capability-based persona lookup

pub mod backlog_repository;
pub mod persona_directory;
pub mod transition_notifier;

pub use backlog_repository::BacklogRepository;
pub use persona_directory::PersonaDirectory;
pub use transition_notifier::{NotifyError, TransitionNotifier};
