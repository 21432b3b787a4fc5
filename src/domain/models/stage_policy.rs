//! Stage policy tables.
//!
//! Which stages an item walks through, and which criteria gate each stage,
//! are configuration rather than code. Criteria resolve through a fallback
//! chain: a tier-specific override for the stage, then the standard gate
//! table, then no criteria at all.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::backlog_item::{DEFAULT_TIER, ECONOMY_TIER};

/// Stage templates and gate criteria keyed by tier and stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StagePolicy {
    /// Stage templates keyed by tier; must contain `standard`
    #[serde(default = "default_templates")]
    pub templates: BTreeMap<String, Vec<String>>,

    /// Standard gate criteria keyed by stage
    #[serde(default = "default_gates")]
    pub gates: BTreeMap<String, Vec<String>>,

    /// Per-tier overrides of the standard gate table
    #[serde(default = "default_tier_gates")]
    pub tier_gates: BTreeMap<String, BTreeMap<String, Vec<String>>>,

    /// Seconds after the last mutation during which unattested advances are refused
    #[serde(default = "default_velocity_window_secs")]
    pub velocity_window_secs: u64,
}

fn labels(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn default_templates() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        (
            DEFAULT_TIER.to_string(),
            labels(&["design", "implement", "verify", "review"]),
        ),
        (ECONOMY_TIER.to_string(), labels(&["implement", "verify"])),
        (
            "premium".to_string(),
            labels(&["research", "design", "implement", "verify", "review"]),
        ),
    ])
}

fn default_gates() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        (
            "research".to_string(),
            labels(&["problem understood", "prior art surveyed"]),
        ),
        (
            "design".to_string(),
            labels(&["design documented", "approach approved"]),
        ),
        (
            "implement".to_string(),
            labels(&["code complete", "self-review passed"]),
        ),
        (
            "verify".to_string(),
            labels(&["tests passing", "edge cases covered"]),
        ),
        ("review".to_string(), labels(&["peer review approved"])),
    ])
}

fn default_tier_gates() -> BTreeMap<String, BTreeMap<String, Vec<String>>> {
    BTreeMap::from([(
        ECONOMY_TIER.to_string(),
        BTreeMap::from([
            ("implement".to_string(), labels(&["code complete"])),
            ("verify".to_string(), labels(&["tests passing"])),
        ]),
    )])
}

const fn default_velocity_window_secs() -> u64 {
    10
}

impl Default for StagePolicy {
    fn default() -> Self {
        Self {
            templates: default_templates(),
            gates: default_gates(),
            tier_gates: default_tier_gates(),
            velocity_window_secs: default_velocity_window_secs(),
        }
    }
}

/// One stage of a resolved plan with the criteria gating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStage {
    pub name: String,
    pub criteria: Vec<String>,
}

/// A fully resolved template: ordered stages and their gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePlan {
    pub stages: Vec<PlannedStage>,
}

impl StagePlan {
    /// Ordered stage names.
    pub fn template(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name.clone()).collect()
    }

    /// Name of the entry stage.
    pub fn first_stage(&self) -> Option<&str> {
        self.stages.first().map(|s| s.name.as_str())
    }

    /// Criteria for a named stage (empty if the stage is not in the plan).
    pub fn criteria_for(&self, stage: &str) -> &[String] {
        self.stages
            .iter()
            .find(|s| s.name == stage)
            .map_or(&[], |s| s.criteria.as_slice())
    }
}
