//! Stage template and gate criteria resolution.
//!
//! Turns a model tier (and an optional caller-supplied template) into the
//! ordered stage list and the criteria gating each stage, using the tables
//! in [`StagePolicy`].

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{normalize_tier, PlannedStage, StagePlan, StagePolicy, DEFAULT_TIER};

/// Resolves templates and criteria from a stage policy.
#[derive(Debug, Clone)]
pub struct StageResolver {
    policy: StagePolicy,
}

impl StageResolver {
    pub fn new(policy: StagePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &StagePolicy {
        &self.policy
    }

    /// Ordered stage names for a tier.
    ///
    /// A non-empty `explicit` template is used verbatim. Otherwise the tier's
    /// template is used, falling back to the standard template for unknown
    /// tiers. Fails only when no standard template is configured.
    pub fn resolve_template(&self, tier: Option<&str>, explicit: Option<&[String]>) -> DomainResult<Vec<String>> {
        if let Some(stages) = explicit.filter(|s| !s.is_empty()) {
            return Ok(stages.to_vec());
        }

        let tier = normalize_tier(tier);
        if let Some(stages) = self.policy.templates.get(&tier).filter(|s| !s.is_empty()) {
            return Ok(stages.clone());
        }

        self.policy
            .templates
            .get(DEFAULT_TIER)
            .filter(|s| !s.is_empty())
            .cloned()
            .ok_or_else(|| DomainError::Configuration("no standard stage template configured".to_string()))
    }

    /// Criteria gating a stage for a tier.
    ///
    /// Looks up the tier override first, then the standard gate table. An
    /// unknown stage has no criteria and passes its gate automatically.
    pub fn resolve_criteria(&self, tier: Option<&str>, stage: &str) -> Vec<String> {
        let tier = normalize_tier(tier);
        self.policy
            .tier_gates
            .get(&tier)
            .and_then(|gates| gates.get(stage))
            .or_else(|| self.policy.gates.get(stage))
            .cloned()
            .unwrap_or_default()
    }

    /// Resolve a template together with the criteria for each of its stages.
    pub fn plan(&self, tier: Option<&str>, explicit: Option<&[String]>) -> DomainResult<StagePlan> {
        let template = self.resolve_template(tier, explicit)?;
        let stages = template
            .into_iter()
            .map(|name| {
                let criteria = self.resolve_criteria(tier, &name);
                PlannedStage { name, criteria }
            })
            .collect();
        Ok(StagePlan { stages })
    }
}

impl Default for StageResolver {
    fn default() -> Self {
        Self::new(StagePolicy::default())
    }
}
