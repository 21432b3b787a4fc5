pub mod event_bus;
pub mod event_queue;
pub mod stage_gate_service;
pub mod stage_resolver;

pub use event_bus::{EventBus, EventBusConfig, EventEnvelope, SequenceNumber};
pub use event_queue::StageEventQueue;
pub use stage_gate_service::{AdvanceOutcome, AdvanceRequest, ItemView, StageGateService, StageInitResult};
pub use stage_resolver::StageResolver;
