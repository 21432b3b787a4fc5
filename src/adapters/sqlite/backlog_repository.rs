//! SQLite implementation of the BacklogRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{parse_datetime, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BacklogItem, GateCriterion, StagePlan};
use crate::domain::ports::BacklogRepository;

const ITEM_COLUMNS: &str =
    "id, title, model_tier, stage_template, stage_index, version, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteBacklogRepository {
    pool: SqlitePool,
}

impl SqliteBacklogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

async fn fetch_item(conn: &mut SqliteConnection, id: Uuid) -> DomainResult<Option<BacklogItem>> {
    let row: Option<BacklogItemRow> =
        sqlx::query_as(&format!("SELECT {ITEM_COLUMNS} FROM backlog_items WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await?;

    row.map(TryInto::try_into).transpose()
}

/// Insert unsatisfied criteria after any existing ones, ignoring duplicate labels.
async fn insert_criteria(
    conn: &mut SqliteConnection,
    id: Uuid,
    stage: &str,
    criteria: &[String],
) -> DomainResult<()> {
    for criterion in criteria {
        sqlx::query(
            r#"INSERT INTO gate_criteria (item_id, stage, criterion, position, satisfied, satisfied_at, satisfied_by)
               VALUES (?, ?, ?,
                       (SELECT COALESCE(MAX(position), -1) + 1 FROM gate_criteria WHERE item_id = ? AND stage = ?),
                       0, NULL, '')
               ON CONFLICT (item_id, stage, criterion) DO NOTHING"#,
        )
        .bind(id.to_string())
        .bind(stage)
        .bind(criterion)
        .bind(id.to_string())
        .bind(stage)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl BacklogRepository for SqliteBacklogRepository {
    async fn create_item(&self, item: &BacklogItem) -> DomainResult<()> {
        let template_json = serde_json::to_string(&item.stage_template)?;

        sqlx::query(
            r#"INSERT INTO backlog_items (id, title, model_tier, stage_template, stage_index, version, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(item.id.to_string())
        .bind(&item.title)
        .bind(&item.model_tier)
        .bind(&template_json)
        .bind(item.stage_index as i64)
        .bind(item.version)
        .bind(item.created_at.to_rfc3339())
        .bind(item.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_item(&self, id: Uuid) -> DomainResult<Option<BacklogItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_item(&mut conn, id).await
    }

    async fn update_item(&self, item: &mut BacklogItem) -> DomainResult<()> {
        let template_json = serde_json::to_string(&item.stage_template)?;

        let result = sqlx::query(
            r#"UPDATE backlog_items SET title = ?, model_tier = ?, stage_template = ?, stage_index = ?,
               version = version + 1, updated_at = ?
               WHERE id = ? AND version = ?"#,
        )
        .bind(&item.title)
        .bind(&item.model_tier)
        .bind(&template_json)
        .bind(item.stage_index as i64)
        .bind(item.updated_at.to_rfc3339())
        .bind(item.id.to_string())
        .bind(item.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_item(item.id).await? {
                Some(_) => Err(DomainError::ConcurrencyConflict {
                    entity: "backlog_item".to_string(),
                    id: item.id.to_string(),
                }),
                None => Err(DomainError::ItemNotFound(item.id)),
            };
        }

        item.version += 1;
        Ok(())
    }

    async fn init_stages(&self, id: Uuid, plan: &StagePlan, replace: bool) -> DomainResult<BacklogItem> {
        let mut tx = self.pool.begin().await?;

        let mut item = fetch_item(&mut tx, id).await?.ok_or(DomainError::ItemNotFound(id))?;
        if item.is_initialized() && !replace {
            return Err(DomainError::AlreadyInitialized(id));
        }

        if replace {
            sqlx::query("DELETE FROM gate_criteria WHERE item_id = ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        item.stage_template = plan.template();
        item.stage_index = 0;
        item.updated_at = Utc::now();
        item.validate().map_err(DomainError::InvalidRequest)?;

        let result = sqlx::query(
            r#"UPDATE backlog_items SET stage_template = ?, stage_index = 0, version = version + 1, updated_at = ?
               WHERE id = ? AND version = ?"#,
        )
        .bind(serde_json::to_string(&item.stage_template)?)
        .bind(item.updated_at.to_rfc3339())
        .bind(id.to_string())
        .bind(item.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ConcurrencyConflict {
                entity: "backlog_item".to_string(),
                id: id.to_string(),
            });
        }
        item.version += 1;

        for stage in plan.stages.iter().filter(|s| !s.criteria.is_empty()) {
            insert_criteria(&mut tx, id, &stage.name, &stage.criteria).await?;
        }

        tx.commit().await?;
        Ok(item)
    }

    async fn create_gate_criteria(&self, id: Uuid, stage: &str, criteria: &[String]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        if fetch_item(&mut tx, id).await?.is_none() {
            return Err(DomainError::ItemNotFound(id));
        }
        insert_criteria(&mut tx, id, stage, criteria).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_gate_status(&self, id: Uuid, stage: &str) -> DomainResult<Vec<GateCriterion>> {
        let rows: Vec<GateCriterionRow> = sqlx::query_as(
            r#"SELECT stage, criterion, satisfied, satisfied_at, satisfied_by
               FROM gate_criteria WHERE item_id = ? AND stage = ? ORDER BY position"#,
        )
        .bind(id.to_string())
        .bind(stage)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn all_criteria_met(&self, id: Uuid, stage: &str) -> DomainResult<bool> {
        let (unmet,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM gate_criteria WHERE item_id = ? AND stage = ? AND satisfied = 0",
        )
        .bind(id.to_string())
        .bind(stage)
        .fetch_one(&self.pool)
        .await?;

        Ok(unmet == 0)
    }

    async fn satisfy_criterion(&self, id: Uuid, stage: &str, criterion: &str, actor: &str) -> DomainResult<u64> {
        let result = sqlx::query(&format!("{SATISFY_UPDATE} AND criterion = ? AND {SATISFY_GUARD}"))
            .bind(Utc::now().to_rfc3339())
            .bind(actor)
            .bind(id.to_string())
            .bind(stage)
            .bind(criterion)
            .bind(actor)
            .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn satisfy_all_criteria(&self, id: Uuid, stage: &str, actor: &str) -> DomainResult<u64> {
        let result = sqlx::query(&format!("{SATISFY_UPDATE} AND {SATISFY_GUARD}"))
            .bind(Utc::now().to_rfc3339())
            .bind(actor)
            .bind(id.to_string())
            .bind(stage)
            .bind(actor)
            .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Marks criteria satisfied. The first `satisfied_at` is kept, and a named
/// actor replaces an empty `satisfied_by` without touching a named one.
const SATISFY_UPDATE: &str = r#"UPDATE gate_criteria
    SET satisfied = 1,
        satisfied_at = COALESCE(satisfied_at, ?),
        satisfied_by = CASE WHEN satisfied_by = '' THEN ? ELSE satisfied_by END
    WHERE item_id = ? AND stage = ?"#;

/// Matches unsatisfied criteria, or programmatic ones a named actor is attesting.
const SATISFY_GUARD: &str = "(satisfied = 0 OR (satisfied_by = '' AND ? <> ''))";

#[derive(sqlx::FromRow)]
struct BacklogItemRow {
    id: String,
    title: String,
    model_tier: String,
    stage_template: String,
    stage_index: i64,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<BacklogItemRow> for BacklogItem {
    type Error = DomainError;

    fn try_from(row: BacklogItemRow) -> Result<Self, Self::Error> {
        let stage_template: Vec<String> = serde_json::from_str(&row.stage_template)?;
        let stage_index = usize::try_from(row.stage_index)
            .map_err(|e| DomainError::SerializationError(format!("Invalid stage_index {}: {e}", row.stage_index)))?;

        Ok(Self {
            id: parse_uuid(&row.id)?,
            title: row.title,
            model_tier: row.model_tier,
            stage_template,
            stage_index,
            version: row.version,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct GateCriterionRow {
    stage: String,
    criterion: String,
    satisfied: bool,
    satisfied_at: Option<String>,
    satisfied_by: String,
}

impl TryFrom<GateCriterionRow> for GateCriterion {
    type Error = DomainError;

    fn try_from(row: GateCriterionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            stage: row.stage,
            criterion: row.criterion,
            satisfied: row.satisfied,
            satisfied_at: parse_optional_datetime(row.satisfied_at)?,
            satisfied_by: row.satisfied_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::PlannedStage;

    async fn setup_test_repo() -> SqliteBacklogRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteBacklogRepository::new(pool)
    }

    fn plan(stages: &[(&str, &[&str])]) -> StagePlan {
        StagePlan {
            stages: stages
                .iter()
                .map(|(name, criteria)| PlannedStage {
                    name: (*name).to_string(),
                    criteria: criteria.iter().map(|c| (*c).to_string()).collect(),
                })
                .collect(),
        }
    }

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_and_get_item() {
        let repo = setup_test_repo().await;
        let item = BacklogItem::new("Stage Test", Some("economy"));
        repo.create_item(&item).await.unwrap();

        let retrieved = repo.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(retrieved.title, "Stage Test");
        assert_eq!(retrieved.model_tier, "economy");
        assert!(retrieved.stage_template.is_empty());
        assert_eq!(retrieved.version, 1);

        assert!(repo.get_item(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_item_detects_stale_version() {
        let repo = setup_test_repo().await;
        let item = BacklogItem::new("Versioned", None);
        repo.create_item(&item).await.unwrap();

        let mut first = repo.get_item(item.id).await.unwrap().unwrap();
        let mut second = first.clone();

        first.title = "First writer".to_string();
        repo.update_item(&mut first).await.unwrap();
        assert_eq!(first.version, 2);

        second.title = "Second writer".to_string();
        let err = repo.update_item(&mut second).await.unwrap_err();
        assert!(matches!(err, DomainError::ConcurrencyConflict { .. }));

        let stored = repo.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "First writer");
    }

    #[tokio::test]
    async fn test_update_missing_item() {
        let repo = setup_test_repo().await;
        let mut ghost = BacklogItem::new("Ghost", None);
        let err = repo.update_item(&mut ghost).await.unwrap_err();
        assert!(matches!(err, DomainError::ItemNotFound(id) if id == ghost.id));
    }

    #[tokio::test]
    async fn test_init_stages_creates_criteria() {
        let repo = setup_test_repo().await;
        let item = BacklogItem::new("Init", None);
        repo.create_item(&item).await.unwrap();

        let plan = plan(&[
            ("implement", &["code complete", "self-review passed"]),
            ("deploy", &[]),
        ]);
        let updated = repo.init_stages(item.id, &plan, false).await.unwrap();
        assert_eq!(updated.stage_template, labels(&["implement", "deploy"]));
        assert_eq!(updated.stage_index, 0);
        assert_eq!(updated.version, 2);

        let criteria = repo.get_gate_status(item.id, "implement").await.unwrap();
        assert_eq!(criteria.len(), 2);
        assert_eq!(criteria[0].criterion, "code complete");
        assert_eq!(criteria[1].criterion, "self-review passed");
        assert!(criteria.iter().all(|c| !c.satisfied && c.satisfied_at.is_none()));

        assert!(repo.get_gate_status(item.id, "deploy").await.unwrap().is_empty());
        assert!(repo.all_criteria_met(item.id, "deploy").await.unwrap());
    }

    #[tokio::test]
    async fn test_init_stages_rejects_or_replaces() {
        let repo = setup_test_repo().await;
        let item = BacklogItem::new("Reinit", None);
        repo.create_item(&item).await.unwrap();

        repo.init_stages(item.id, &plan(&[("build", &["compiles"])]), false).await.unwrap();
        repo.satisfy_all_criteria(item.id, "build", "a1").await.unwrap();

        let err = repo
            .init_stages(item.id, &plan(&[("other", &["x"])]), false)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyInitialized(_)));
        let unchanged = repo.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(unchanged.stage_template, labels(&["build"]));

        let replaced = repo
            .init_stages(item.id, &plan(&[("build", &["compiles"]), ("ship", &[])]), true)
            .await
            .unwrap();
        assert_eq!(replaced.stage_template, labels(&["build", "ship"]));

        let criteria = repo.get_gate_status(item.id, "build").await.unwrap();
        assert_eq!(criteria.len(), 1);
        assert!(!criteria[0].satisfied, "replace resets prior satisfaction");
    }

    #[tokio::test]
    async fn test_init_stages_missing_item() {
        let repo = setup_test_repo().await;
        let err = repo
            .init_stages(Uuid::new_v4(), &plan(&[("build", &[])]), false)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ItemNotFound(_)));
    }

    #[tokio::test]
    async fn test_create_gate_criteria_skips_duplicates() {
        let repo = setup_test_repo().await;
        let item = BacklogItem::new("Dupes", None);
        repo.create_item(&item).await.unwrap();

        repo.create_gate_criteria(item.id, "implement", &labels(&["code complete"])).await.unwrap();
        repo.create_gate_criteria(item.id, "implement", &labels(&["code complete", "docs updated"]))
            .await
            .unwrap();

        let criteria = repo.get_gate_status(item.id, "implement").await.unwrap();
        let names: Vec<_> = criteria.iter().map(|c| c.criterion.as_str()).collect();
        assert_eq!(names, vec!["code complete", "docs updated"]);

        let err = repo
            .create_gate_criteria(Uuid::new_v4(), "implement", &labels(&["x"]))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ItemNotFound(_)));
    }

    #[tokio::test]
    async fn test_satisfy_criterion() {
        let repo = setup_test_repo().await;
        let item = BacklogItem::new("Satisfy", None);
        repo.create_item(&item).await.unwrap();
        repo.create_gate_criteria(item.id, "implement", &labels(&["code complete", "self-review passed"]))
            .await
            .unwrap();

        let changed = repo.satisfy_criterion(item.id, "implement", "code complete", "a1").await.unwrap();
        assert_eq!(changed, 1);
        assert!(!repo.all_criteria_met(item.id, "implement").await.unwrap());

        let criteria = repo.get_gate_status(item.id, "implement").await.unwrap();
        assert!(criteria[0].satisfied);
        assert_eq!(criteria[0].satisfied_by, "a1");
        let stamped_at = criteria[0].satisfied_at.unwrap();

        // Second satisfaction does not restamp or change the actor.
        let again = repo.satisfy_criterion(item.id, "implement", "code complete", "a2").await.unwrap();
        assert_eq!(again, 0);
        let criteria = repo.get_gate_status(item.id, "implement").await.unwrap();
        assert_eq!(criteria[0].satisfied_by, "a1");
        assert_eq!(criteria[0].satisfied_at, Some(stamped_at));

        let missing = repo.satisfy_criterion(item.id, "implement", "no such thing", "a1").await.unwrap();
        assert_eq!(missing, 0);
        assert_eq!(repo.get_gate_status(item.id, "implement").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_named_actor_attests_programmatic_satisfaction() {
        let repo = setup_test_repo().await;
        let item = BacklogItem::new("Attest", None);
        repo.create_item(&item).await.unwrap();
        repo.create_gate_criteria(item.id, "implement", &labels(&["code complete", "self-review passed"]))
            .await
            .unwrap();

        assert_eq!(repo.satisfy_all_criteria(item.id, "implement", "").await.unwrap(), 2);
        let stamped_at = repo.get_gate_status(item.id, "implement").await.unwrap()[0].satisfied_at;

        // Another programmatic pass changes nothing.
        assert_eq!(repo.satisfy_criterion(item.id, "implement", "code complete", "").await.unwrap(), 0);

        let changed = repo.satisfy_criterion(item.id, "implement", "code complete", "reviewer").await.unwrap();
        assert_eq!(changed, 1);
        let criteria = repo.get_gate_status(item.id, "implement").await.unwrap();
        assert_eq!(criteria[0].satisfied_by, "reviewer");
        assert_eq!(criteria[0].satisfied_at, stamped_at);
        assert_eq!(criteria[1].satisfied_by, "");

        // A named actor never overwrites another named actor.
        assert_eq!(repo.satisfy_all_criteria(item.id, "implement", "lead").await.unwrap(), 1);
        let criteria = repo.get_gate_status(item.id, "implement").await.unwrap();
        assert_eq!(criteria[0].satisfied_by, "reviewer");
        assert_eq!(criteria[1].satisfied_by, "lead");
    }

    #[tokio::test]
    async fn test_satisfy_all_criteria() {
        let repo = setup_test_repo().await;
        let item = BacklogItem::new("Satisfy all", None);
        repo.create_item(&item).await.unwrap();
        repo.create_gate_criteria(item.id, "verify", &labels(&["tests passing", "edge cases covered"]))
            .await
            .unwrap();
        repo.satisfy_criterion(item.id, "verify", "tests passing", "human").await.unwrap();

        let changed = repo.satisfy_all_criteria(item.id, "verify", "").await.unwrap();
        assert_eq!(changed, 1);
        assert!(repo.all_criteria_met(item.id, "verify").await.unwrap());

        let criteria = repo.get_gate_status(item.id, "verify").await.unwrap();
        assert_eq!(criteria[0].satisfied_by, "human");
        assert_eq!(criteria[1].satisfied_by, "");
    }
}
