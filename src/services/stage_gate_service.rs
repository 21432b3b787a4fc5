//! Stage-gate state machine.
//!
//! Items move `Uninitialized -> InStage(0) -> ... -> InStage(last)`, one stage
//! at a time. Leaving a stage requires every gate criterion of that stage to
//! be satisfied, unless the advance is forced with a reason. Events are
//! queued only after the corresponding mutation has committed.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BacklogItem, GateStatus, StageEvent, ALL_CRITERIA};
use crate::domain::ports::BacklogRepository;
use crate::services::event_queue::StageEventQueue;
use crate::services::stage_resolver::StageResolver;

/// An item together with its derived current stage.
#[derive(Debug, Clone, Serialize)]
pub struct ItemView {
    #[serde(flatten)]
    pub item: BacklogItem,
    pub current_stage: Option<String>,
}

impl From<BacklogItem> for ItemView {
    fn from(item: BacklogItem) -> Self {
        let current_stage = item.current_stage().map(str::to_string);
        Self { item, current_stage }
    }
}

/// Result of initializing an item's stages.
#[derive(Debug, Clone, Serialize)]
pub struct StageInitResult {
    pub item: ItemView,
    /// Gate status of every stage in template order
    pub gates: Vec<GateStatus>,
}

/// Parameters for an advance attempt.
#[derive(Debug, Clone, Default)]
pub struct AdvanceRequest {
    /// Bypass the gate and velocity checks
    pub force: bool,
    /// Mandatory when forcing
    pub reason: Option<String>,
    /// Who requested the advance, for the audit log
    pub actor: String,
}

/// Result of a successful advance.
#[derive(Debug, Clone, Serialize)]
pub struct AdvanceOutcome {
    pub item: ItemView,
    pub previous_stage: String,
    pub current_stage: String,
    /// The item reached its final stage
    pub completed: bool,
    pub forced: bool,
}

pub struct StageGateService<R: BacklogRepository> {
    repository: Arc<R>,
    resolver: StageResolver,
    events: StageEventQueue,
}

impl<R: BacklogRepository> StageGateService<R> {
    pub fn new(repository: Arc<R>, resolver: StageResolver, events: StageEventQueue) -> Self {
        Self {
            repository,
            resolver,
            events,
        }
    }

    pub fn resolver(&self) -> &StageResolver {
        &self.resolver
    }

    /// Create a new, uninitialized backlog item.
    pub async fn create_item(&self, title: &str, model_tier: Option<&str>) -> DomainResult<BacklogItem> {
        let item = BacklogItem::new(title.trim(), model_tier);
        item.validate().map_err(DomainError::InvalidRequest)?;
        self.repository.create_item(&item).await?;

        tracing::info!(item_id = %item.id, tier = %item.model_tier, "created backlog item");
        Ok(item)
    }

    /// Get an item by ID.
    pub async fn get_item(&self, id: Uuid) -> DomainResult<BacklogItem> {
        self.repository.get_item(id).await?.ok_or(DomainError::ItemNotFound(id))
    }

    /// Assign a stage template and create the gate criteria for every stage.
    ///
    /// An already-initialized item is rejected unless `replace` is set, in
    /// which case all existing criteria (and their satisfaction state) are
    /// discarded and the item starts over at the first stage.
    pub async fn initialize(
        &self,
        id: Uuid,
        explicit_template: Option<&[String]>,
        replace: bool,
    ) -> DomainResult<StageInitResult> {
        let item = self.get_item(id).await?;
        if item.is_initialized() && !replace {
            return Err(DomainError::AlreadyInitialized(id));
        }

        let plan = self.resolver.plan(Some(&item.model_tier), explicit_template)?;
        if plan.stages.iter().any(|s| s.name.trim().is_empty()) {
            return Err(DomainError::InvalidRequest("stage names cannot be empty".to_string()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = plan.stages.iter().find(|s| !seen.insert(s.name.as_str())) {
            return Err(DomainError::InvalidRequest(format!("duplicate stage name '{}'", dup.name)));
        }

        let item = self.repository.init_stages(id, &plan, replace).await?;
        let first = item.current_stage().unwrap_or_default().to_string();

        if replace {
            tracing::warn!(item_id = %id, template = ?item.stage_template, "re-initialized stages, prior gate state discarded");
        } else {
            tracing::info!(item_id = %id, template = ?item.stage_template, "initialized stages");
        }

        self.events.enqueue(StageEvent::StageAdvanced {
            item_id: id,
            previous_stage: String::new(),
            current_stage: first,
            tier: item.model_tier.clone(),
        });

        let mut gates = Vec::with_capacity(item.stage_template.len());
        for stage in &item.stage_template {
            let criteria = self.repository.get_gate_status(id, stage).await?;
            gates.push(GateStatus::new(stage.clone(), criteria));
        }

        Ok(StageInitResult {
            item: item.into(),
            gates,
        })
    }

    /// Move an item forward by exactly one stage.
    pub async fn advance_stage(&self, id: Uuid, request: AdvanceRequest) -> DomainResult<AdvanceOutcome> {
        let mut item = self.get_item(id).await?;
        if !item.is_initialized() {
            return Err(DomainError::NotInitialized(id));
        }

        let reason = request.reason.as_deref().map(str::trim).unwrap_or_default();
        if request.force && reason.is_empty() {
            return Err(DomainError::InvalidRequest("a reason is required to force an advance".to_string()));
        }

        let stage = item.current_stage().unwrap_or_default().to_string();
        if item.is_at_final_stage() {
            return Err(DomainError::TerminalStage { stage });
        }

        if !request.force {
            let status = GateStatus::new(stage.clone(), self.repository.get_gate_status(id, &stage).await?);
            if !status.all_met {
                let unmet = status.unmet();
                tracing::info!(item_id = %id, stage = %stage, unmet = ?unmet, "advance blocked by unmet gate");
                return Err(DomainError::GateUnmet { stage, unmet });
            }
            self.check_velocity(&item, &status)?;
        }

        let Some((previous_stage, current_stage)) = item.step_forward() else {
            return Err(DomainError::TerminalStage { stage });
        };
        item.updated_at = Utc::now();
        self.repository.update_item(&mut item).await?;

        if request.force {
            tracing::warn!(
                item_id = %id,
                from = %previous_stage,
                to = %current_stage,
                reason = %reason,
                actor = %request.actor,
                "forced stage advance"
            );
        } else {
            tracing::info!(item_id = %id, from = %previous_stage, to = %current_stage, "advanced stage");
        }

        let completed = item.is_at_final_stage();
        self.events.enqueue(StageEvent::StageAdvanced {
            item_id: id,
            previous_stage: previous_stage.clone(),
            current_stage: current_stage.clone(),
            tier: item.model_tier.clone(),
        });
        if completed {
            self.events.enqueue(StageEvent::StageCompleted {
                item_id: id,
                tier: item.model_tier.clone(),
                total_stages: item.stage_template.len(),
            });
        }

        Ok(AdvanceOutcome {
            item: item.into(),
            previous_stage,
            current_stage,
            completed,
            forced: request.force,
        })
    }

    /// Refuse unattested advances that follow the last mutation too closely.
    fn check_velocity(&self, item: &BacklogItem, status: &GateStatus) -> DomainResult<()> {
        let window_secs = self.resolver.policy().velocity_window_secs;
        if window_secs == 0 || status.criteria.is_empty() || status.has_attestation() {
            return Ok(());
        }

        // A timestamp in the future counts as inside the window.
        let elapsed = (Utc::now() - item.updated_at).to_std().unwrap_or_default();
        if elapsed < Duration::from_secs(window_secs) {
            tracing::info!(item_id = %item.id, stage = %status.stage, window_secs, "advance blocked by velocity check");
            return Err(DomainError::VelocityCheck { window_secs });
        }
        Ok(())
    }

    /// Satisfy one criterion. Defaults to the item's current stage.
    ///
    /// An unknown label changes nothing and is not an error.
    pub async fn satisfy_criterion(
        &self,
        id: Uuid,
        stage: Option<&str>,
        criterion: &str,
        actor: &str,
    ) -> DomainResult<GateStatus> {
        let criterion = criterion.trim();
        if criterion.is_empty() {
            return Err(DomainError::InvalidRequest("criterion is required unless satisfying all".to_string()));
        }

        let stage = self.target_stage(id, stage).await?;
        let changed = self.repository.satisfy_criterion(id, &stage, criterion, actor).await?;
        self.after_satisfy(id, stage, criterion, actor, changed).await
    }

    /// Satisfy every criterion of a stage. Defaults to the item's current stage.
    pub async fn satisfy_all(&self, id: Uuid, stage: Option<&str>, actor: &str) -> DomainResult<GateStatus> {
        let stage = self.target_stage(id, stage).await?;
        let changed = self.repository.satisfy_all_criteria(id, &stage, actor).await?;
        self.after_satisfy(id, stage, ALL_CRITERIA, actor, changed).await
    }

    async fn after_satisfy(
        &self,
        id: Uuid,
        stage: String,
        criterion: &str,
        actor: &str,
        changed: u64,
    ) -> DomainResult<GateStatus> {
        if changed > 0 {
            tracing::info!(item_id = %id, stage = %stage, criterion, actor, changed, "gate criteria satisfied");
            self.events.enqueue(StageEvent::GateSatisfied {
                item_id: id,
                stage: stage.clone(),
                criterion: criterion.to_string(),
                satisfied_by: actor.to_string(),
            });
        } else {
            tracing::debug!(item_id = %id, stage = %stage, criterion, "satisfy changed nothing");
        }

        let criteria = self.repository.get_gate_status(id, &stage).await?;
        Ok(GateStatus::new(stage, criteria))
    }

    async fn target_stage(&self, id: Uuid, stage: Option<&str>) -> DomainResult<String> {
        let item = self.get_item(id).await?;
        if !item.is_initialized() {
            return Err(DomainError::NotInitialized(id));
        }
        Ok(match stage.map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => item.current_stage().unwrap_or_default().to_string(),
        })
    }

    /// Read-only gate snapshot. Defaults to the item's current stage.
    ///
    /// An uninitialized item reports no criteria, which is vacuously met.
    pub async fn gate_status(&self, id: Uuid, stage: Option<&str>) -> DomainResult<GateStatus> {
        let item = self.get_item(id).await?;
        let stage = match stage.map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => item.current_stage().unwrap_or_default().to_string(),
        };

        if !item.is_initialized() {
            return Ok(GateStatus::new(stage, Vec::new()));
        }

        let criteria = self.repository.get_gate_status(id, &stage).await?;
        Ok(GateStatus::new(stage, criteria))
    }
}
