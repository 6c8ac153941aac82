//! PostgreSQL repository for workflows and tasks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pmflow_core::{IntentId, TaskId, WorkflowId};
use pmflow_workflow::{
    RepositoryError, Task, TaskOutput, TaskStatus, TaskType, Workflow, WorkflowRepository,
    WorkflowStatus, WorkflowType,
};
use serde_json::{Map, Value as JsonValue};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

/// Maps a sqlx error onto the repository taxonomy.
pub(crate) fn db_error(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            RepositoryError::ConnectionFailed {
                message: e.to_string(),
            }
        }
        other => RepositoryError::QueryFailed {
            message: other.to_string(),
        },
    }
}

fn invalid(what: &str, value: &str, reason: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::InvalidRecord {
        message: format!("invalid {what} '{value}': {reason}"),
    }
}

fn json_object(value: Option<JsonValue>) -> Option<Map<String, JsonValue>> {
    match value {
        Some(JsonValue::Object(map)) => Some(map),
        _ => None,
    }
}

/// Row type for workflow queries.
#[derive(Debug, FromRow)]
struct WorkflowRow {
    id: String,
    workflow_type: String,
    status: String,
    context: JsonValue,
    result: Option<JsonValue>,
    error: Option<String>,
    intent_id: String,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

/// Row type for task queries.
#[derive(Debug, FromRow)]
struct TaskRow {
    id: String,
    task_type: String,
    status: String,
    result: Option<JsonValue>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl TaskRow {
    fn try_into_task(self) -> Result<Task, RepositoryError> {
        Ok(Task {
            id: TaskId::from_str(&self.id).map_err(|e| invalid("task id", &self.id, e))?,
            task_type: TaskType::from_str_value(&self.task_type)
                .ok_or_else(|| invalid("task type", &self.task_type, "unknown"))?,
            status: TaskStatus::from_str_value(&self.status)
                .ok_or_else(|| invalid("task status", &self.status, "unknown"))?,
            result: json_object(self.result),
            error: self.error,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}

impl WorkflowRow {
    fn try_into_workflow(self, tasks: Vec<Task>) -> Result<Workflow, RepositoryError> {
        Ok(Workflow {
            id: WorkflowId::from_str(&self.id).map_err(|e| invalid("workflow id", &self.id, e))?,
            workflow_type: WorkflowType::from_str_value(&self.workflow_type)
                .ok_or_else(|| invalid("workflow type", &self.workflow_type, "unknown"))?,
            status: WorkflowStatus::from_str_value(&self.status)
                .ok_or_else(|| invalid("workflow status", &self.status, "unknown"))?,
            tasks,
            context: json_object(Some(self.context)).unwrap_or_default(),
            result: self.result,
            error: self.error,
            intent_id: IntentId::from_str(&self.intent_id)
                .map_err(|e| invalid("intent id", &self.intent_id, e))?,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}

/// Workflow repository backed by PostgreSQL.
///
/// Every call runs in its own transaction. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct PgRepository {
    pub(crate) pool: PgPool,
}

impl PgRepository {
    /// Creates a new repository.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowRepository for PgRepository {
    async fn create_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query(
            r#"
            INSERT INTO workflows
                (id, workflow_type, status, context, result, error, intent_id,
                 created_at, started_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(workflow.id.to_string())
        .bind(workflow.workflow_type.as_str())
        .bind(workflow.status.as_str())
        .bind(JsonValue::Object(workflow.context.clone()))
        .bind(&workflow.result)
        .bind(&workflow.error)
        .bind(workflow.intent_id.to_string())
        .bind(workflow.created_at)
        .bind(workflow.started_at)
        .bind(workflow.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)
    }

    async fn update_workflow_status(
        &self,
        id: WorkflowId,
        status: WorkflowStatus,
        result: Option<&JsonValue>,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now();
        let started_at = (status == WorkflowStatus::Running).then_some(now);
        let completed_at = status.is_terminal().then_some(now);

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let updated = sqlx::query(
            r#"
            UPDATE workflows
            SET status = $2,
                started_at = COALESCE($3, started_at),
                completed_at = COALESCE($4, completed_at),
                result = COALESCE($5, result),
                error = COALESCE($6, error)
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .bind(status.as_str())
        .bind(started_at)
        .bind(completed_at)
        .bind(result)
        .bind(error)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound {
                entity: "workflow",
                id: id.to_string(),
            });
        }
        tx.commit().await.map_err(db_error)
    }

    async fn create_task(
        &self,
        workflow_id: WorkflowId,
        task: &Task,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query(
            r#"
            INSERT INTO tasks
                (id, workflow_id, position, task_type, status, result, error,
                 created_at, started_at, completed_at)
            VALUES ($1, $2, (SELECT COUNT(*) FROM tasks WHERE workflow_id = $2),
                    $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(task.id.to_string())
        .bind(workflow_id.to_string())
        .bind(task.task_type.as_str())
        .bind(task.status.as_str())
        .bind(task.result.clone().map(JsonValue::Object))
        .bind(&task.error)
        .bind(task.created_at)
        .bind(task.started_at)
        .bind(task.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)
    }

    async fn update_task(
        &self,
        id: TaskId,
        status: TaskStatus,
        result: Option<&TaskOutput>,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now();
        let started_at = (status == TaskStatus::Running).then_some(now);
        let completed_at = status.is_terminal().then_some(now);
        let result = result.cloned().map(JsonValue::Object);

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let updated = sqlx::query(
            r#"
            UPDATE tasks
            SET status = $2,
                started_at = COALESCE($3, started_at),
                completed_at = COALESCE($4, completed_at),
                result = COALESCE($5, result),
                error = COALESCE($6, error)
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .bind(status.as_str())
        .bind(started_at)
        .bind(completed_at)
        .bind(&result)
        .bind(error)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound {
                entity: "task",
                id: id.to_string(),
            });
        }

        // Completed output joins the workflow context so a reload sees it.
        if let (TaskStatus::Completed, Some(output)) = (status, &result) {
            sqlx::query(
                r#"
                UPDATE workflows
                SET context = context || $2
                WHERE id = (SELECT workflow_id FROM tasks WHERE id = $1)
                "#,
            )
            .bind(id.to_string())
            .bind(output)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }
        tx.commit().await.map_err(db_error)
    }

    async fn load_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let row: Option<WorkflowRow> = sqlx::query_as(
            r#"
            SELECT id, workflow_type, status, context, result, error, intent_id,
                   created_at, started_at, completed_at
            FROM workflows
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let task_rows: Vec<TaskRow> = sqlx::query_as(
            r#"
            SELECT id, task_type, status, result, error, created_at, started_at, completed_at
            FROM tasks
            WHERE workflow_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(id.to_string())
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;

        let tasks = task_rows
            .into_iter()
            .map(TaskRow::try_into_task)
            .collect::<Result<Vec<_>, _>>()?;
        row.try_into_workflow(tasks).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task_row(status: &str) -> TaskRow {
        TaskRow {
            id: TaskId::new().to_string(),
            task_type: "github_create_issue".to_string(),
            status: status.to_string(),
            result: Some(json!({"issue_number": 7})),
            error: None,
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
        }
    }

    fn workflow_row() -> WorkflowRow {
        WorkflowRow {
            id: WorkflowId::new().to_string(),
            workflow_type: "create_ticket".to_string(),
            status: "completed".to_string(),
            context: json!({"repository": "acme/shop", "issue_number": 7}),
            result: Some(json!({"github_create_issue": {"issue_number": 7}})),
            error: None,
            intent_id: IntentId::new().to_string(),
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
        }
    }

    #[test]
    fn rows_map_to_workflow() {
        let task = task_row("completed").try_into_task().expect("task");
        assert_eq!(task.task_type, TaskType::GithubCreateIssue);
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.as_ref().unwrap()["issue_number"], 7);

        let workflow = workflow_row().try_into_workflow(vec![task]).expect("workflow");
        assert_eq!(workflow.workflow_type, WorkflowType::CreateTicket);
        assert_eq!(workflow.status, WorkflowStatus::Completed);
        assert_eq!(workflow.context_str("repository"), Some("acme/shop"));
        assert_eq!(workflow.tasks.len(), 1);
    }

    #[test]
    fn unknown_status_is_invalid_record() {
        let err = task_row("paused").try_into_task().unwrap_err();
        assert_eq!(
            err,
            RepositoryError::InvalidRecord {
                message: "invalid task status 'paused': unknown".to_string()
            }
        );
    }

    #[test]
    fn bad_id_is_invalid_record() {
        let mut row = workflow_row();
        row.id = "wf_not-a-ulid".to_string();
        assert!(matches!(
            row.try_into_workflow(Vec::new()),
            Err(RepositoryError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn pool_errors_are_connection_failures() {
        assert!(matches!(
            db_error(sqlx::Error::PoolTimedOut),
            RepositoryError::ConnectionFailed { .. }
        ));
        assert!(matches!(
            db_error(sqlx::Error::RowNotFound),
            RepositoryError::QueryFailed { .. }
        ));
    }
}
