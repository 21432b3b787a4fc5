//! Backlog repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{BacklogItem, GateCriterion, StagePlan};

/// Repository interface for backlog items and their gate criteria.
///
/// Implementations must serialize mutations on a single item: `update_item`
/// only succeeds when the stored version matches the item's version, and
/// `init_stages` applies the template and every criterion as one unit.
#[async_trait]
pub trait BacklogRepository: Send + Sync {
    /// Insert a new item.
    async fn create_item(&self, item: &BacklogItem) -> DomainResult<()>;

    /// Get an item by ID.
    async fn get_item(&self, id: Uuid) -> DomainResult<Option<BacklogItem>>;

    /// Persist an item's mutable fields.
    ///
    /// Fails with `ConcurrencyConflict` if the item changed since it was read;
    /// on success the passed item's version is advanced to match storage.
    async fn update_item(&self, item: &mut BacklogItem) -> DomainResult<()>;

    /// Assign a stage plan: template, cursor reset and fresh criteria.
    ///
    /// With `replace`, any existing criteria for the item are deleted first.
    /// Returns the updated item.
    async fn init_stages(&self, id: Uuid, plan: &StagePlan, replace: bool) -> DomainResult<BacklogItem>;

    /// Create unsatisfied criteria for a stage, skipping labels that already exist.
    async fn create_gate_criteria(&self, id: Uuid, stage: &str, criteria: &[String]) -> DomainResult<()>;

    /// List a stage's criteria in creation order.
    async fn get_gate_status(&self, id: Uuid, stage: &str) -> DomainResult<Vec<GateCriterion>>;

    /// Whether every criterion of a stage is satisfied (true for zero criteria).
    async fn all_criteria_met(&self, id: Uuid, stage: &str) -> DomainResult<bool>;

    /// Satisfy one criterion if it exists and is unsatisfied.
    ///
    /// A named `actor` also attests a criterion that was satisfied
    /// programmatically; its original `satisfied_at` is kept.
    ///
    /// Returns the number of criteria that changed (0 or 1).
    async fn satisfy_criterion(&self, id: Uuid, stage: &str, criterion: &str, actor: &str) -> DomainResult<u64>;

    /// Satisfy every unsatisfied criterion of a stage, attesting
    /// programmatic satisfactions when `actor` is named.
    ///
    /// Returns the number of criteria that changed.
    async fn satisfy_all_criteria(&self, id: Uuid, stage: &str, actor: &str) -> DomainResult<u64>;
}
