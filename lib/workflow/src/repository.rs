//! Durable storage boundary for workflows and tasks.
//!
//! The engine writes every state transition through [`WorkflowRepository`]
//! before applying it in memory, and reloads evicted workflows with
//! [`WorkflowRepository::load_workflow`]. Implementations run each call in
//! its own transaction.

use crate::error::RepositoryError;
use crate::execution::{Task, TaskStatus, Workflow, WorkflowStatus};
use crate::handler::TaskOutput;
use async_trait::async_trait;
use chrono::Utc;
use pmflow_core::{TaskId, WorkflowId};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Trait for workflow persistence.
///
/// This abstraction allows the engine to be tested without a database while
/// still supporting the PostgreSQL implementation in production.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Stores a new workflow record (without its tasks).
    async fn create_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError>;

    /// Records a workflow status change. Stamps `started_at` on running and
    /// `completed_at` on terminal states.
    async fn update_workflow_status(
        &self,
        id: WorkflowId,
        status: WorkflowStatus,
        result: Option<&JsonValue>,
        error: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Stores a new task record for a workflow.
    async fn create_task(&self, workflow_id: WorkflowId, task: &Task)
    -> Result<(), RepositoryError>;

    /// Records a task status change. Stamps timestamps the same way as
    /// [`update_workflow_status`](Self::update_workflow_status).
    async fn update_task(
        &self,
        id: TaskId,
        status: TaskStatus,
        result: Option<&TaskOutput>,
        error: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Loads a workflow with its tasks in order. The returned context
    /// includes the output of every completed task.
    async fn load_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>, RepositoryError>;
}

/// One recorded repository write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A workflow record was created.
    WorkflowCreated(WorkflowId),
    /// A workflow changed status.
    WorkflowStatus(WorkflowId, WorkflowStatus),
    /// A task record was created.
    TaskCreated(TaskId),
    /// A task changed status.
    TaskStatus(TaskId, TaskStatus),
}

#[derive(Debug, Default)]
struct Store {
    workflows: HashMap<WorkflowId, Workflow>,
    task_owner: HashMap<TaskId, WorkflowId>,
    log: Vec<Transition>,
}

/// Repository kept in process memory.
///
/// Used by tests and by the CLI when no database is configured. Cloning
/// shares the underlying store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    store: Arc<Mutex<Store>>,
}

impl InMemoryRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write so far, in order.
    pub async fn transitions(&self) -> Vec<Transition> {
        self.store.lock().await.log.clone()
    }

    /// The status changes recorded for one task, in order.
    pub async fn task_history(&self, id: TaskId) -> Vec<TaskStatus> {
        self.store
            .lock()
            .await
            .log
            .iter()
            .filter_map(|t| match t {
                Transition::TaskStatus(task_id, status) if *task_id == id => Some(*status),
                _ => None,
            })
            .collect()
    }

    /// Number of stored workflows.
    pub async fn workflow_count(&self) -> usize {
        self.store.lock().await.workflows.len()
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryRepository {
    async fn create_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        let mut store = self.store.lock().await;
        let mut record = workflow.clone();
        record.tasks.clear();
        store.workflows.insert(workflow.id, record);
        store.log.push(Transition::WorkflowCreated(workflow.id));
        Ok(())
    }

    async fn update_workflow_status(
        &self,
        id: WorkflowId,
        status: WorkflowStatus,
        result: Option<&JsonValue>,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut store = self.store.lock().await;
        let record = store
            .workflows
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "workflow",
                id: id.to_string(),
            })?;

        let now = Utc::now();
        record.status = status;
        if status == WorkflowStatus::Running {
            record.started_at = Some(now);
        }
        if status.is_terminal() {
            record.completed_at = Some(now);
        }
        if let Some(result) = result {
            record.result = Some(result.clone());
        }
        if let Some(error) = error {
            record.error = Some(error.to_string());
        }
        store.log.push(Transition::WorkflowStatus(id, status));
        Ok(())
    }

    async fn create_task(
        &self,
        workflow_id: WorkflowId,
        task: &Task,
    ) -> Result<(), RepositoryError> {
        let mut store = self.store.lock().await;
        let record = store
            .workflows
            .get_mut(&workflow_id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "workflow",
                id: workflow_id.to_string(),
            })?;
        record.tasks.push(task.clone());
        store.task_owner.insert(task.id, workflow_id);
        store.log.push(Transition::TaskCreated(task.id));
        Ok(())
    }

    async fn update_task(
        &self,
        id: TaskId,
        status: TaskStatus,
        result: Option<&TaskOutput>,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut store = self.store.lock().await;
        let not_found = || RepositoryError::NotFound {
            entity: "task",
            id: id.to_string(),
        };
        let workflow_id = *store.task_owner.get(&id).ok_or_else(not_found)?;
        let record = store
            .workflows
            .get_mut(&workflow_id)
            .ok_or_else(not_found)?;
        let task = record.task_mut(id).ok_or_else(not_found)?;

        let now = Utc::now();
        task.status = status;
        if status == TaskStatus::Running {
            task.started_at = Some(now);
        }
        if status.is_terminal() {
            task.completed_at = Some(now);
        }
        if let Some(error) = error {
            task.error = Some(error.to_string());
        }
        if let Some(result) = result {
            task.result = Some(result.clone());
            if status == TaskStatus::Completed {
                record.merge_output(result);
            }
        }
        store.log.push(Transition::TaskStatus(id, status));
        Ok(())
    }

    async fn load_workflow(&self, id: WorkflowId) -> Result<Option<Workflow>, RepositoryError> {
        Ok(self.store.lock().await.workflows.get(&id).cloned())
    }
}
