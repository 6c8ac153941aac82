//! Work items and the CREATE_WORK_ITEM handler.

use crate::context::{original_message, truncate_chars};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pmflow_core::{WorkItemId, WorkflowId};
use pmflow_workflow::{
    RepositoryError, Task, TaskFailure, TaskHandler, TaskOutcome, TaskOutput, TaskType, Workflow,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

const MAX_TITLE_CHARS: usize = 100;

/// A minimal ticket-like record owned by pmflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub workflow_id: WorkflowId,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl WorkItem {
    #[must_use]
    pub fn new(
        workflow_id: WorkflowId,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: WorkItemId::new(),
            workflow_id,
            title: title.into(),
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}

/// Durable storage for work items.
#[async_trait]
pub trait WorkItemStore: Send + Sync {
    /// Stores a new work item.
    async fn create_work_item(&self, item: &WorkItem) -> Result<(), RepositoryError>;
}

/// Work item store kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkItemStore {
    items: Arc<Mutex<Vec<WorkItem>>>,
}

impl InMemoryWorkItemStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored item in insertion order.
    pub async fn items(&self) -> Vec<WorkItem> {
        self.items.lock().await.clone()
    }
}

#[async_trait]
impl WorkItemStore for InMemoryWorkItemStore {
    async fn create_work_item(&self, item: &WorkItem) -> Result<(), RepositoryError> {
        self.items.lock().await.push(item.clone());
        Ok(())
    }
}

/// Records the request as a work item.
///
/// The title is the original message cut to 100 characters. The description
/// is the extracted requirements when an earlier task produced them.
pub struct CreateWorkItemHandler {
    store: Arc<dyn WorkItemStore>,
}

impl CreateWorkItemHandler {
    #[must_use]
    pub fn new(store: Arc<dyn WorkItemStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TaskHandler for CreateWorkItemHandler {
    fn task_type(&self) -> TaskType {
        TaskType::CreateWorkItem
    }

    async fn handle(&self, workflow: &Workflow, _task: &Task) -> TaskOutcome {
        let message = original_message(workflow)?;
        let title = truncate_chars(message, MAX_TITLE_CHARS);
        let description = workflow.context_str("requirements").unwrap_or(message);

        let item = WorkItem::new(workflow.id, title, description);
        self.store
            .create_work_item(&item)
            .await
            .map_err(|e| TaskFailure::new(format!("failed to create work item: {e}")))?;

        info!(work_item_id = %item.id, workflow_id = %workflow.id, "work item created");
        let mut output = TaskOutput::new();
        output.insert("work_item_id".to_string(), json!(item.id.to_string()));
        output.insert("title".to_string(), json!(item.title));
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::workflow_with;
    use pmflow_workflow::WorkflowType;

    struct BrokenStore;

    #[async_trait]
    impl WorkItemStore for BrokenStore {
        async fn create_work_item(&self, _item: &WorkItem) -> Result<(), RepositoryError> {
            Err(RepositoryError::ConnectionFailed {
                message: "pool closed".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn stores_item_with_requirements() {
        let store = InMemoryWorkItemStore::new();
        let handler = CreateWorkItemHandler::new(Arc::new(store.clone()));
        let workflow = workflow_with(
            WorkflowType::CreateFeature,
            json!({"original_message": "Add CSV export", "requirements": "- export button"}),
        );

        let output = handler.handle(&workflow, &workflow.tasks[3]).await.unwrap();

        let items = store.items().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Add CSV export");
        assert_eq!(items[0].description, "- export button");
        assert_eq!(items[0].workflow_id, workflow.id);
        assert_eq!(output["work_item_id"], json!(items[0].id.to_string()));
        assert_eq!(output["title"], "Add CSV export");
    }

    #[tokio::test]
    async fn long_message_title_is_cut() {
        let store = InMemoryWorkItemStore::new();
        let handler = CreateWorkItemHandler::new(Arc::new(store.clone()));
        let message = "a".repeat(250);
        let workflow = workflow_with(
            WorkflowType::CreateFeature,
            json!({"original_message": message}),
        );

        handler.handle(&workflow, &workflow.tasks[3]).await.unwrap();

        let items = store.items().await;
        assert_eq!(items[0].title.chars().count(), 100);
        assert_eq!(items[0].description, message);
    }

    #[tokio::test]
    async fn store_failure_fails_task() {
        let handler = CreateWorkItemHandler::new(Arc::new(BrokenStore));
        let workflow = workflow_with(
            WorkflowType::CreateFeature,
            json!({"original_message": "Add CSV export"}),
        );

        let failure = handler
            .handle(&workflow, &workflow.tasks[3])
            .await
            .unwrap_err();
        assert!(failure.message.contains("pool closed"));
    }
}
