//! PostgreSQL storage for work items.

use super::workflow::{PgRepository, db_error};
use async_trait::async_trait;
use pmflow_tasks::{WorkItem, WorkItemStore};
use pmflow_workflow::RepositoryError;

#[async_trait]
impl WorkItemStore for PgRepository {
    async fn create_work_item(&self, item: &WorkItem) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        sqlx::query(
            r#"
            INSERT INTO work_items (id, workflow_id, title, description, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(item.id.to_string())
        .bind(item.workflow_id.to_string())
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)
    }
}
