//! Outbound queue decoupling transition events from their delivery.
//!
//! Producers enqueue without awaiting; a detached dispatcher task drains the
//! queue into a [`TransitionNotifier`]. Delivery is at-most-once: a full
//! queue drops the event and publish failures are logged, never retried.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::models::StageEvent;
use crate::domain::ports::TransitionNotifier;

/// Sending half of the outbound event queue.
#[derive(Clone)]
pub struct StageEventQueue {
    sender: mpsc::Sender<StageEvent>,
}

impl StageEventQueue {
    /// Create a queue and spawn its dispatcher on the current runtime.
    ///
    /// The dispatcher exits once every queue handle has been dropped and the
    /// remaining events have been delivered.
    pub fn start(notifier: Arc<dyn TransitionNotifier>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(dispatch(receiver, notifier));
        (Self { sender }, handle)
    }

    /// Queue an event for delivery without waiting.
    ///
    /// Returns false when the event was dropped.
    pub fn enqueue(&self, event: StageEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(subject = %event.subject(), "event queue full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::warn!(subject = %event.subject(), "event dispatcher stopped, dropping event");
                false
            }
        }
    }
}

async fn dispatch(mut receiver: mpsc::Receiver<StageEvent>, notifier: Arc<dyn TransitionNotifier>) {
    while let Some(event) = receiver.recv().await {
        let subject = event.subject();
        match notifier.publish(&subject, &event).await {
            Ok(()) => tracing::debug!(subject = %subject, "published stage event"),
            Err(e) => tracing::warn!(subject = %subject, error = %e, "failed to publish stage event"),
        }
    }
    tracing::debug!("event dispatcher stopped");
}
