//! Transition events emitted after committed stage and gate mutations.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload published to downstream subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StageEvent {
    /// Item entered the pipeline (empty `previous_stage`) or moved forward.
    StageAdvanced {
        item_id: Uuid,
        previous_stage: String,
        current_stage: String,
        tier: String,
    },
    /// Item reached the final stage of its template.
    StageCompleted {
        item_id: Uuid,
        tier: String,
        total_stages: usize,
    },
    /// One criterion, or all of them (`"*"`), was satisfied.
    GateSatisfied {
        item_id: Uuid,
        stage: String,
        criterion: String,
        satisfied_by: String,
    },
}

impl StageEvent {
    /// Item the event refers to.
    pub fn item_id(&self) -> Uuid {
        match self {
            Self::StageAdvanced { item_id, .. }
            | Self::StageCompleted { item_id, .. }
            | Self::GateSatisfied { item_id, .. } => *item_id,
        }
    }

    /// Routing subject for the external bus.
    pub fn subject(&self) -> String {
        let suffix = match self {
            Self::StageAdvanced { .. } => "stage.advanced",
            Self::StageCompleted { .. } => "stage.completed",
            Self::GateSatisfied { .. } => "gate.satisfied",
        };
        format!("backlog.{}.{}", self.item_id(), suffix)
    }
}
