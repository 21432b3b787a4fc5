//! Backlog item domain model.
//!
//! A backlog item is the unit of work that moves through a stage template.
//! Only the cursor (`stage_index`) is stored; the current stage name is
//! always derived from the template so the two can never disagree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tier applied when an item does not name one.
pub const DEFAULT_TIER: &str = "standard";

/// Tier that receives the reduced gate policy in the shipped configuration.
pub const ECONOMY_TIER: &str = "economy";

/// Normalize a tier name, mapping absent or blank tiers to [`DEFAULT_TIER`].
pub fn normalize_tier(tier: Option<&str>) -> String {
    match tier.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => DEFAULT_TIER.to_string(),
    }
}

/// A tracked unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklogItem {
    /// Unique identifier
    pub id: Uuid,
    /// Human-readable title
    pub title: String,
    /// Model tier driving template and criteria selection
    pub model_tier: String,
    /// Ordered stage names; empty until stages are initialized
    pub stage_template: Vec<String>,
    /// Zero-based cursor into `stage_template`
    pub stage_index: usize,
    /// Optimistic concurrency token
    pub version: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl BacklogItem {
    /// Create a new uninitialized item.
    pub fn new(title: impl Into<String>, model_tier: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            model_tier: normalize_tier(model_tier),
            stage_template: Vec::new(),
            stage_index: 0,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a stage template has been assigned.
    pub fn is_initialized(&self) -> bool {
        !self.stage_template.is_empty()
    }

    /// Name of the stage the item is currently in.
    pub fn current_stage(&self) -> Option<&str> {
        self.stage_template.get(self.stage_index).map(String::as_str)
    }

    /// Index of the final stage, if initialized.
    pub fn last_index(&self) -> Option<usize> {
        self.stage_template.len().checked_sub(1)
    }

    /// Whether the cursor sits on the final stage.
    pub fn is_at_final_stage(&self) -> bool {
        self.last_index() == Some(self.stage_index)
    }

    /// Move the cursor forward by one stage.
    ///
    /// Returns the `(previous, current)` stage names, or `None` when the item
    /// is uninitialized or already at its final stage.
    pub fn step_forward(&mut self) -> Option<(String, String)> {
        if !self.is_initialized() || self.is_at_final_stage() {
            return None;
        }
        let previous = self.stage_template[self.stage_index].clone();
        self.stage_index += 1;
        let current = self.stage_template[self.stage_index].clone();
        Some((previous, current))
    }

    /// Validate invariants before persisting.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title cannot be empty".to_string());
        }
        if self.is_initialized() && self.stage_index >= self.stage_template.len() {
            return Err(format!(
                "stage_index {} out of range for {} stages",
                self.stage_index,
                self.stage_template.len()
            ));
        }
        if self.stage_template.iter().any(|s| s.trim().is_empty()) {
            return Err("stage names cannot be empty".to_string());
        }
        Ok(())
    }
}
