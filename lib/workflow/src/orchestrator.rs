//! Workflow orchestration engine.
//!
//! The engine turns intents into persisted workflows and runs their tasks in
//! definition order:
//! 1. Resolve the workflow handle (registry, else reload from the repository)
//! 2. Move the workflow from pending to running under its lock
//! 3. Claim the first pending task and mark it running
//! 4. Run its handler against a snapshot, outside the lock
//! 5. Record the outcome; the first failure fails the workflow and stops
//! 6. Complete the workflow once every task has succeeded
//!
//! A workflow is pinned in the registry for the whole run, so lookups during
//! execution see the executing copy rather than a reload.
//!
//! Every transition is written to the repository before it is applied in
//! memory. A failed write on the way to a success state fails the task and
//! the workflow instead.

use crate::error::{EngineError, RepositoryError};
use crate::execution::{Task, TaskStatus, Workflow, WorkflowStatus};
use crate::factory::WorkflowFactory;
use crate::handler::{HandlerRegistry, TaskFailure, TaskOutcome};
use crate::intent::Intent;
use crate::registry::{EngineConfig, WorkflowHandle, WorkflowRegistry};
use crate::repository::WorkflowRepository;
use futures::FutureExt;
use pmflow_core::{TaskId, WorkflowId};
use rootcause::prelude::Report;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// Drives workflows from creation to a terminal state.
pub struct OrchestrationEngine<R: WorkflowRepository> {
    factory: WorkflowFactory,
    handlers: HandlerRegistry,
    registry: WorkflowRegistry,
    repository: R,
    reload: Mutex<()>,
}

impl<R: WorkflowRepository> OrchestrationEngine<R> {
    /// Creates an engine with the built-in workflow factory.
    pub fn new(repository: R, handlers: HandlerRegistry, config: &EngineConfig) -> Self {
        Self {
            factory: WorkflowFactory::new(),
            handlers,
            registry: WorkflowRegistry::from_config(config),
            repository,
            reload: Mutex::new(()),
        }
    }

    /// Replaces the workflow factory.
    #[must_use]
    pub fn with_factory(mut self, factory: WorkflowFactory) -> Self {
        self.factory = factory;
        self
    }

    /// The workflow factory, for registering extra actions.
    pub fn factory_mut(&mut self) -> &mut WorkflowFactory {
        &mut self.factory
    }

    /// The underlying repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// The in-memory workflow cache.
    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    /// Creates and persists the workflow for an intent.
    ///
    /// Returns `Ok(None)` when the intent needs no workflow. The workflow is
    /// cached only after it and all of its tasks have been stored. If a task
    /// cannot be stored, the stored workflow is marked failed.
    #[instrument(skip_all, fields(intent_id = %intent.id, action = %intent.action))]
    pub async fn create_workflow_from_intent(
        &self,
        intent: &Intent,
    ) -> Result<Option<Workflow>, Report<EngineError>> {
        let Some(workflow) = self.factory.create_from_intent(intent) else {
            info!(category = %intent.category, "no workflow needed for intent");
            return Ok(None);
        };
        let workflow_id = workflow.id;

        self.repository
            .create_workflow(&workflow)
            .await
            .map_err(|e| EngineError::persistence(workflow_id, &e))?;
        for task in &workflow.tasks {
            if let Err(e) = self.repository.create_task(workflow_id, task).await {
                self.abandon(workflow_id, &e).await;
                return Err(EngineError::persistence(workflow_id, &e).into());
            }
        }

        info!(
            workflow_id = %workflow_id,
            workflow_type = %workflow.workflow_type,
            tasks = workflow.tasks.len(),
            "workflow created"
        );
        self.registry.insert(workflow.clone()).await;
        Ok(Some(workflow))
    }

    /// Returns the current state of a workflow, reloading it from the
    /// repository if it is not cached.
    pub async fn get_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Option<Workflow>, Report<EngineError>> {
        if let Some(workflow) = self.registry.snapshot(workflow_id).await {
            return Ok(Some(workflow));
        }
        match self.reload_handle(workflow_id).await? {
            Some(handle) => Ok(Some(handle.lock().await.clone())),
            None => Ok(None),
        }
    }

    /// Runs every task of a pending workflow and returns its terminal state.
    ///
    /// Task failures are reported through the returned workflow, not as
    /// errors. Errors mean the call itself was invalid (unknown id, workflow
    /// already started) or the start could not be persisted.
    #[instrument(skip_all, fields(workflow_id = %workflow_id))]
    pub async fn execute_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Workflow, Report<EngineError>> {
        let handle = self.claim(workflow_id).await?;
        let outcome = self.run(&handle).await;
        self.registry.unpin(workflow_id).await;
        outcome
    }

    /// Marks a workflow whose tasks could not all be stored as failed.
    async fn abandon(&self, workflow_id: WorkflowId, cause: &RepositoryError) {
        let summary = format!("failed to persist tasks: {cause}");
        error!(workflow_id = %workflow_id, error = %cause, "workflow stored without all of its tasks");
        if let Err(e) = self
            .repository
            .update_workflow_status(workflow_id, WorkflowStatus::Failed, None, Some(&summary))
            .await
        {
            error!(workflow_id = %workflow_id, error = %e, "failed to persist workflow failure");
        }
    }

    /// Resolves and pins the one handle every caller executing or reading
    /// this workflow will share until the run ends.
    async fn claim(&self, workflow_id: WorkflowId) -> Result<WorkflowHandle, Report<EngineError>> {
        let _guard = self.reload.lock().await;
        let handle = self
            .resolve(workflow_id)
            .await?
            .ok_or(EngineError::WorkflowNotFound { workflow_id })?;
        Ok(self.registry.pin(workflow_id, &handle).await)
    }

    async fn run(&self, handle: &WorkflowHandle) -> Result<Workflow, Report<EngineError>> {
        self.begin(handle).await?;

        while let Some((snapshot, task)) = self.claim_next_task(handle).await? {
            let outcome = self.run_handler(&snapshot, &task).await;
            if !self.record_outcome(handle, task.id, outcome).await? {
                break;
            }
        }

        self.finish(handle).await?;

        let workflow = handle.lock().await.clone();
        Ok(workflow)
    }

    async fn reload_handle(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Option<WorkflowHandle>, Report<EngineError>> {
        let _guard = self.reload.lock().await;
        self.resolve(workflow_id).await
    }

    /// Callers hold the reload lock.
    async fn resolve(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Option<WorkflowHandle>, Report<EngineError>> {
        if let Some(handle) = self.registry.get(workflow_id).await {
            return Ok(Some(handle));
        }

        let loaded = self
            .repository
            .load_workflow(workflow_id)
            .await
            .map_err(|e| EngineError::persistence(workflow_id, &e))?;
        match loaded {
            Some(workflow) => {
                debug!(workflow_id = %workflow_id, "reloaded workflow from repository");
                Ok(Some(self.registry.insert(workflow).await))
            }
            None => Ok(None),
        }
    }

    async fn begin(&self, handle: &WorkflowHandle) -> Result<(), Report<EngineError>> {
        let mut workflow = handle.lock().await;
        let workflow_id = workflow.id;
        if workflow.status != WorkflowStatus::Pending {
            return Err(EngineError::AlreadyStarted {
                workflow_id,
                status: workflow.status,
            }
            .into());
        }
        let expected = workflow.workflow_type.definition().task_sequence.len();
        if workflow.tasks.len() != expected {
            return Err(EngineError::InvalidState {
                workflow_id,
                details: format!(
                    "workflow has {} of its {expected} tasks",
                    workflow.tasks.len()
                ),
            }
            .into());
        }

        self.repository
            .update_workflow_status(workflow_id, WorkflowStatus::Running, None, None)
            .await
            .map_err(|e| EngineError::persistence(workflow_id, &e))?;
        workflow
            .start()
            .map_err(|e| EngineError::invalid_state(workflow_id, &e))?;

        info!(workflow_type = %workflow.workflow_type, "workflow started");
        Ok(())
    }

    async fn claim_next_task(
        &self,
        handle: &WorkflowHandle,
    ) -> Result<Option<(Workflow, Task)>, Report<EngineError>> {
        let mut workflow = handle.lock().await;
        if workflow.status != WorkflowStatus::Running {
            return Ok(None);
        }
        let Some(index) = workflow.next_pending_index() else {
            return Ok(None);
        };

        let workflow_id = workflow.id;
        let task_id = workflow.tasks[index].id;
        let persisted = self
            .repository
            .update_task(task_id, TaskStatus::Running, None, None)
            .await;
        workflow.tasks[index]
            .start()
            .map_err(|e| EngineError::invalid_state(workflow_id, &e))?;

        if let Err(e) = persisted {
            error!(task_id = %task_id, error = %e, "failed to persist task start");
            self.fail_task(&mut workflow, index, format!("failed to persist task start: {e}"))
                .await?;
            return Ok(None);
        }

        debug!(task_id = %task_id, task_type = %workflow.tasks[index].task_type, "task started");
        let task = workflow.tasks[index].clone();
        Ok(Some((workflow.clone(), task)))
    }

    async fn run_handler(&self, workflow: &Workflow, task: &Task) -> TaskOutcome {
        let Some(handler) = self.handlers.get(task.task_type) else {
            return Err(TaskFailure::new(format!(
                "no handler registered for task type {}",
                task.task_type
            )));
        };

        match AssertUnwindSafe(handler.handle(workflow, task))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => Err(TaskFailure::new(format!(
                "handler panicked: {}",
                panic_message(panic.as_ref())
            ))),
        }
    }

    /// Applies a handler outcome. Returns false when execution must stop.
    async fn record_outcome(
        &self,
        handle: &WorkflowHandle,
        task_id: TaskId,
        outcome: TaskOutcome,
    ) -> Result<bool, Report<EngineError>> {
        let mut workflow = handle.lock().await;
        let workflow_id = workflow.id;
        let index = workflow
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| EngineError::InvalidState {
                workflow_id,
                details: format!("task {task_id} disappeared during execution"),
            })?;

        let output = match outcome {
            Ok(output) => output,
            Err(failure) => {
                self.fail_task(&mut workflow, index, failure.message).await?;
                return Ok(false);
            }
        };

        if let Err(e) = self
            .repository
            .update_task(task_id, TaskStatus::Completed, Some(&output), None)
            .await
        {
            error!(task_id = %task_id, error = %e, "failed to persist task result");
            self.fail_task(&mut workflow, index, format!("failed to persist task result: {e}"))
                .await?;
            return Ok(false);
        }

        workflow.merge_output(&output);
        let task = &mut workflow.tasks[index];
        task.complete(output)
            .map_err(|e| EngineError::invalid_state(workflow_id, &e))?;
        info!(task_id = %task_id, task_type = %task.task_type, "task completed");
        Ok(true)
    }

    /// Fails a running task and its workflow. Both writes are best effort:
    /// the workflow is terminal either way.
    async fn fail_task(
        &self,
        workflow: &mut Workflow,
        index: usize,
        message: String,
    ) -> Result<(), Report<EngineError>> {
        let workflow_id = workflow.id;
        let task = &mut workflow.tasks[index];
        let task_id = task.id;
        let summary = format!("{} failed: {message}", task.task_type);

        if let Err(e) = self
            .repository
            .update_task(task_id, TaskStatus::Failed, None, Some(&message))
            .await
        {
            error!(task_id = %task_id, error = %e, "failed to persist task failure");
        }
        warn!(task_id = %task_id, task_type = %task.task_type, error = %message, "task failed");
        task.fail(message)
            .map_err(|e| EngineError::invalid_state(workflow_id, &e))?;

        self.fail_workflow(workflow, summary).await
    }

    async fn fail_workflow(
        &self,
        workflow: &mut Workflow,
        summary: String,
    ) -> Result<(), Report<EngineError>> {
        let workflow_id = workflow.id;
        if let Err(e) = self
            .repository
            .update_workflow_status(workflow_id, WorkflowStatus::Failed, None, Some(&summary))
            .await
        {
            error!(error = %e, "failed to persist workflow failure");
        }
        warn!(error = %summary, "workflow failed");
        workflow
            .fail(summary)
            .map_err(|e| EngineError::invalid_state(workflow_id, &e))?;
        Ok(())
    }

    async fn finish(&self, handle: &WorkflowHandle) -> Result<(), Report<EngineError>> {
        let mut workflow = handle.lock().await;
        let workflow_id = workflow.id;
        if workflow.status != WorkflowStatus::Running {
            return Ok(());
        }
        if !workflow.is_complete() {
            return Err(EngineError::InvalidState {
                workflow_id,
                details: "execution stopped with unfinished tasks".to_string(),
            }
            .into());
        }

        let result = workflow.collect_results();
        match self
            .repository
            .update_workflow_status(workflow_id, WorkflowStatus::Completed, Some(&result), None)
            .await
        {
            Ok(()) => {
                workflow
                    .complete(Some(result))
                    .map_err(|e| EngineError::invalid_state(workflow_id, &e))?;
                info!("workflow completed");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "failed to persist workflow completion");
                self.fail_workflow(
                    &mut workflow,
                    format!("failed to persist workflow completion: {e}"),
                )
                .await
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
