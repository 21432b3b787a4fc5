//! Gate criterion domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Criterion label recorded on bulk-satisfaction events.
pub const ALL_CRITERIA: &str = "*";

/// One named condition gating passage out of an (item, stage) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateCriterion {
    /// Stage the criterion belongs to
    pub stage: String,
    /// Label, unique within its (item, stage) scope
    pub criterion: String,
    /// Whether the criterion has been satisfied
    pub satisfied: bool,
    /// When the criterion was first satisfied
    pub satisfied_at: Option<DateTime<Utc>>,
    /// Actor that satisfied it; empty for programmatic satisfaction
    pub satisfied_by: String,
}

impl GateCriterion {
    /// Create an unsatisfied criterion.
    pub fn new(stage: impl Into<String>, criterion: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            criterion: criterion.into(),
            satisfied: false,
            satisfied_at: None,
            satisfied_by: String::new(),
        }
    }

    /// Satisfied by a named human or agent rather than programmatically.
    pub fn is_attested(&self) -> bool {
        self.satisfied && !self.satisfied_by.is_empty()
    }
}

/// Snapshot of a single stage's gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStatus {
    pub stage: String,
    pub criteria: Vec<GateCriterion>,
    pub all_met: bool,
}

impl GateStatus {
    /// Build a status, computing `all_met` over the given criteria.
    ///
    /// A stage with no criteria is vacuously met.
    pub fn new(stage: impl Into<String>, criteria: Vec<GateCriterion>) -> Self {
        let all_met = criteria.iter().all(|c| c.satisfied);
        Self {
            stage: stage.into(),
            criteria,
            all_met,
        }
    }

    /// Labels of criteria that are still unsatisfied, in stored order.
    pub fn unmet(&self) -> Vec<String> {
        self.criteria
            .iter()
            .filter(|c| !c.satisfied)
            .map(|c| c.criterion.clone())
            .collect()
    }

    /// Whether any criterion was satisfied by a named actor.
    pub fn has_attestation(&self) -> bool {
        self.criteria.iter().any(GateCriterion::is_attested)
    }
}
