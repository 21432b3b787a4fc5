//! In-process broadcast bus for stage transition events.
//!
//! Each published event is wrapped in an envelope carrying its subject, a
//! monotonically increasing sequence number and a timestamp.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

use crate::domain::models::StageEvent;
use crate::domain::ports::{NotifyError, TransitionNotifier};

/// Monotonically increasing sequence number assigned by EventBus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A published event with its routing metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub sequence: SequenceNumber,
    pub subject: String,
    pub timestamp: DateTime<Utc>,
    pub event: StageEvent,
}

/// Configuration for the EventBus.
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Channel capacity for the broadcast channel.
    pub channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self { channel_capacity: 1024 }
    }
}

/// Broadcasts transition events to any number of in-process subscribers.
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    sequence: AtomicU64,
}

impl EventBus {
    pub fn new(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Get the next sequence number to be assigned.
    pub fn current_sequence(&self) -> SequenceNumber {
        SequenceNumber(self.sequence.load(Ordering::SeqCst))
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}

#[async_trait]
impl TransitionNotifier for EventBus {
    async fn publish(&self, subject: &str, event: &StageEvent) -> Result<(), NotifyError> {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: SequenceNumber(seq),
            subject: subject.to_string(),
            timestamp: Utc::now(),
            event: event.clone(),
        };

        // No subscribers is not an error
        let _ = self.sender.send(envelope);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn advanced(item_id: Uuid) -> StageEvent {
        StageEvent::StageAdvanced {
            item_id,
            previous_stage: String::new(),
            current_stage: "implement".to_string(),
            tier: "economy".to_string(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_sequence_assignment() {
        let bus = EventBus::default();
        assert_eq!(bus.current_sequence().0, 0);

        let mut rx = bus.subscribe();
        let event = advanced(Uuid::new_v4());

        bus.publish(&event.subject(), &event).await.unwrap();
        let first = rx.recv().await.unwrap();
        assert_eq!(first.sequence.0, 0);
        assert_eq!(first.subject, event.subject());
        assert_eq!(first.event, event);

        bus.publish(&event.subject(), &event).await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(second.sequence.0, 1);

        assert_eq!(bus.current_sequence().0, 2);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_succeeds() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(), 0);

        let event = advanced(Uuid::new_v4());
        assert!(bus.publish(&event.subject(), &event).await.is_ok());
        assert_eq!(bus.current_sequence().0, 1);
    }
}
