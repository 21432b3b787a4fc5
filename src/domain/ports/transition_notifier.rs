//! Transition notifier port.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::StageEvent;

/// Error returned by a notifier. Never surfaced to stage-gate callers.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Outbound sink for stage transition events.
#[async_trait]
pub trait TransitionNotifier: Send + Sync {
    /// Publish an event under a routing subject.
    async fn publish(&self, subject: &str, event: &StageEvent) -> Result<(), NotifyError>;
}
