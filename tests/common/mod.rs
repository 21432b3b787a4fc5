//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use stagegate::adapters::sqlite::{create_migrated_test_pool, SqliteBacklogRepository};
use stagegate::domain::models::{StageEvent, StagePolicy};
use stagegate::services::{EventBus, EventEnvelope, StageEventQueue, StageGateService, StageResolver};
use tokio::sync::broadcast;

pub type TestService = StageGateService<SqliteBacklogRepository>;

/// A service over an in-memory database, publishing onto an event bus.
pub struct Harness {
    pub service: TestService,
    pub events: broadcast::Receiver<EventEnvelope>,
}

impl Harness {
    pub async fn new(policy: StagePolicy) -> Self {
        let pool = create_migrated_test_pool().await.expect("test pool");
        let bus = Arc::new(EventBus::default());
        let events = bus.subscribe();
        let (queue, _dispatcher) = StageEventQueue::start(bus, 64);
        let service = StageGateService::new(
            Arc::new(SqliteBacklogRepository::new(pool)),
            StageResolver::new(policy),
            queue,
        );
        Self { service, events }
    }

    /// Default policy with the velocity check disabled.
    pub async fn without_velocity() -> Self {
        Self::new(StagePolicy {
            velocity_window_secs: 0,
            ..StagePolicy::default()
        })
        .await
    }

    pub async fn next_event(&mut self) -> StageEvent {
        tokio::time::timeout(Duration::from_secs(2), self.events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event bus closed")
            .event
    }

    pub async fn assert_no_event(&mut self) {
        let res = tokio::time::timeout(Duration::from_millis(100), self.events.recv()).await;
        assert!(res.is_err(), "unexpected event: {res:?}");
    }
}
