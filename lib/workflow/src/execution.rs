//! Workflow and task state machines.
//!
//! A [`Workflow`] owns an ordered list of [`Task`]s. Task status only moves
//! forward: `Pending -> Running -> {Completed | Failed | Skipped}`. The
//! transition methods reject anything else with a [`TransitionError`] so a
//! corrupt sequence is caught where it happens rather than persisted.

use crate::definition::{TaskType, WorkflowType};
use chrono::{DateTime, Utc};
use pmflow_core::{IntentId, TaskId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// The overall state of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Created, not yet executing.
    Pending,
    /// The engine is executing tasks.
    Running,
    /// Every task completed or was skipped.
    Completed,
    /// A task failed.
    Failed,
}

impl WorkflowStatus {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns the storage name of this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a storage name.
    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The state of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for earlier tasks.
    Pending,
    /// Handed to its handler.
    Running,
    /// Handler succeeded.
    Completed,
    /// Handler failed.
    Failed,
    /// Deliberately not run.
    Skipped,
}

impl TaskStatus {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Returns true for terminal states that count as success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }

    /// Returns the storage name of this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Parses a storage name.
    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Returns true if a task may move from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed | Self::Failed | Self::Skipped)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// A task status change outside the forward-only sequence.
    Task {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },
    /// A workflow status change outside the forward-only sequence.
    Workflow {
        workflow_id: WorkflowId,
        from: WorkflowStatus,
        to: WorkflowStatus,
    },
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task { task_id, from, to } => {
                write!(f, "task {task_id} cannot move from {from} to {to}")
            }
            Self::Workflow {
                workflow_id,
                from,
                to,
            } => write!(f, "workflow {workflow_id} cannot move from {from} to {to}"),
        }
    }
}

impl std::error::Error for TransitionError {}

/// One unit of work within a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier for this task.
    pub id: TaskId,
    /// Which handler runs this task.
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Current state.
    pub status: TaskStatus,
    /// Handler output, once completed.
    pub result: Option<Map<String, JsonValue>>,
    /// Failure message, once failed.
    pub error: Option<String>,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the task started running.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates a pending task.
    #[must_use]
    pub fn new(task_type: TaskType) -> Self {
        Self {
            id: TaskId::new(),
            task_type,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError::Task {
                task_id: self.id,
                from: self.status,
                to,
            });
        }
        let now = Utc::now();
        if to == TaskStatus::Running {
            self.started_at = Some(now);
        } else {
            self.completed_at = Some(now);
        }
        self.status = to;
        Ok(())
    }

    /// Marks the task as running.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Running)
    }

    /// Marks the task as completed with the handler's output.
    pub fn complete(&mut self, output: Map<String, JsonValue>) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Completed)?;
        self.result = Some(output);
        Ok(())
    }

    /// Marks the task as failed.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    /// Marks a running task as skipped.
    pub fn skip(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Skipped)
    }
}

/// A stateful, ordered set of tasks created to fulfil one intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier for this workflow.
    pub id: WorkflowId,
    /// The definition this workflow was instantiated from.
    #[serde(rename = "type")]
    pub workflow_type: WorkflowType,
    /// Current state.
    pub status: WorkflowStatus,
    /// Tasks in execution order.
    pub tasks: Vec<Task>,
    /// Data shared across tasks. Completed task output is merged in here.
    pub context: Map<String, JsonValue>,
    /// Collected task outputs, once completed.
    pub result: Option<JsonValue>,
    /// Failure summary, once failed.
    pub error: Option<String>,
    /// The intent this workflow fulfils.
    pub intent_id: IntentId,
    /// When the workflow was created.
    pub created_at: DateTime<Utc>,
    /// When execution started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the workflow reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Workflow {
    /// Instantiates a pending workflow with one pending task per step of the
    /// type's definition.
    #[must_use]
    pub fn new(
        workflow_type: WorkflowType,
        intent_id: IntentId,
        context: Map<String, JsonValue>,
    ) -> Self {
        let tasks = workflow_type
            .definition()
            .task_sequence
            .iter()
            .copied()
            .map(Task::new)
            .collect();

        Self {
            id: WorkflowId::new(),
            workflow_type,
            status: WorkflowStatus::Pending,
            tasks,
            context,
            result: None,
            error: None,
            intent_id,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Index of the first pending task, in definition order.
    #[must_use]
    pub fn next_pending_index(&self) -> Option<usize> {
        self.tasks
            .iter()
            .position(|t| t.status == TaskStatus::Pending)
    }

    /// The first pending task, in definition order.
    #[must_use]
    pub fn next_pending_task(&self) -> Option<&Task> {
        self.next_pending_index().map(|i| &self.tasks[i])
    }

    /// Looks up a task by id.
    #[must_use]
    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    /// Looks up a task by id, mutably.
    pub fn task_mut(&mut self, task_id: TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    /// Returns true if every task completed or was skipped.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.tasks.iter().all(|t| t.status.is_success())
    }

    /// Returns true if any task failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.tasks.iter().any(|t| t.status == TaskStatus::Failed)
    }

    /// Returns the first failed task, if any.
    #[must_use]
    pub fn failed_task(&self) -> Option<&Task> {
        self.tasks.iter().find(|t| t.status == TaskStatus::Failed)
    }

    fn transition(&mut self, to: WorkflowStatus) -> Result<(), TransitionError> {
        let allowed = matches!(
            (self.status, to),
            (WorkflowStatus::Pending, WorkflowStatus::Running)
                | (
                    WorkflowStatus::Running,
                    WorkflowStatus::Completed | WorkflowStatus::Failed
                )
        );
        if !allowed {
            return Err(TransitionError::Workflow {
                workflow_id: self.id,
                from: self.status,
                to,
            });
        }
        let now = Utc::now();
        if to == WorkflowStatus::Running {
            self.started_at = Some(now);
        } else {
            self.completed_at = Some(now);
        }
        self.status = to;
        Ok(())
    }

    /// Starts the workflow.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(WorkflowStatus::Running)
    }

    /// Marks the workflow as completed.
    pub fn complete(&mut self, result: Option<JsonValue>) -> Result<(), TransitionError> {
        self.transition(WorkflowStatus::Completed)?;
        self.result = result;
        Ok(())
    }

    /// Marks the workflow as failed.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(WorkflowStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    /// Merges a task's output into the shared context. Later keys win.
    pub fn merge_output(&mut self, output: &Map<String, JsonValue>) {
        for (key, value) in output {
            self.context.insert(key.clone(), value.clone());
        }
    }

    /// Collects completed task outputs keyed by task type name.
    #[must_use]
    pub fn collect_results(&self) -> JsonValue {
        let results = self
            .tasks
            .iter()
            .filter_map(|t| {
                t.result
                    .as_ref()
                    .map(|r| (t.task_type.as_str().to_string(), JsonValue::Object(r.clone())))
            })
            .collect::<Map<_, _>>();
        JsonValue::Object(results)
    }

    /// Reads a string value from the shared context.
    #[must_use]
    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(JsonValue::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature_workflow() -> Workflow {
        Workflow::new(WorkflowType::CreateFeature, IntentId::new(), Map::new())
    }

    #[test]
    fn new_workflow_is_pending_with_pending_tasks() {
        let workflow = feature_workflow();
        assert_eq!(workflow.status, WorkflowStatus::Pending);
        assert_eq!(workflow.tasks.len(), 6);
        assert!(workflow.tasks.iter().all(|t| t.status == TaskStatus::Pending));
        assert_eq!(workflow.tasks[0].task_type, TaskType::AnalyzeRequest);
        assert_eq!(workflow.tasks[5].task_type, TaskType::NotifyStakeholders);
    }

    #[test]
    fn task_transitions_are_forward_only() {
        let mut task = Task::new(TaskType::CreateSummary);

        assert!(task.complete(Map::new()).is_err());
        task.start().expect("start");
        assert!(task.started_at.is_some());
        assert!(task.start().is_err());
        task.fail("boom").expect("fail");
        assert_eq!(task.error.as_deref(), Some("boom"));
        assert!(task.completed_at.is_some());

        let err = task.start().expect_err("terminal task cannot restart");
        assert!(err.to_string().contains("cannot move from failed to running"));
    }

    #[test]
    fn skip_requires_running() {
        let mut task = Task::new(TaskType::CreateSummary);
        assert!(task.skip().is_err());
        task.start().expect("start");
        task.skip().expect("skip");
        assert!(task.status.is_success());
    }

    #[test]
    fn next_pending_is_lowest_index() {
        let mut workflow = feature_workflow();
        assert_eq!(workflow.next_pending_index(), Some(0));

        workflow.tasks[0].start().expect("start");
        assert_eq!(workflow.next_pending_index(), Some(1));

        workflow.tasks[0].complete(Map::new()).expect("complete");
        workflow.tasks[1].start().expect("start");
        assert_eq!(
            workflow.next_pending_task().map(|t| t.task_type),
            Some(TaskType::IdentifyDependencies)
        );
    }

    #[test]
    fn workflow_transitions_are_forward_only() {
        let mut workflow = feature_workflow();
        assert!(workflow.complete(None).is_err());
        workflow.start().expect("start");
        assert!(workflow.start().is_err());
        workflow.fail("task failed").expect("fail");
        assert!(workflow.complete(None).is_err());
        assert!(workflow.status.is_terminal());
    }

    #[test]
    fn completion_and_failure_predicates() {
        let mut workflow = Workflow::new(WorkflowType::LearnPattern, IntentId::new(), Map::new());
        assert!(!workflow.is_complete());

        for task in &mut workflow.tasks {
            task.start().expect("start");
            task.complete(Map::new()).expect("complete");
        }
        assert!(workflow.is_complete());
        assert!(!workflow.has_failures());

        let mut workflow = Workflow::new(WorkflowType::LearnPattern, IntentId::new(), Map::new());
        workflow.tasks[0].start().expect("start");
        workflow.tasks[0].fail("nope").expect("fail");
        assert!(workflow.has_failures());
        assert_eq!(
            workflow.failed_task().map(|t| t.task_type),
            Some(TaskType::AnalyzeRequest)
        );
    }

    #[test]
    fn merge_and_collect() {
        let mut workflow = Workflow::new(WorkflowType::LearnPattern, IntentId::new(), Map::new());
        let mut output = Map::new();
        output.insert("analysis".to_string(), json!("looks good"));

        workflow.tasks[0].start().expect("start");
        workflow.tasks[0].complete(output.clone()).expect("complete");
        workflow.merge_output(&output);

        assert_eq!(workflow.context_str("analysis"), Some("looks good"));
        assert_eq!(
            workflow.collect_results(),
            json!({"analyze_request": {"analysis": "looks good"}})
        );
    }

    #[test]
    fn serializes_type_field() {
        let workflow = Workflow::new(WorkflowType::CreateTicket, IntentId::new(), Map::new());
        let value = serde_json::to_value(&workflow).expect("serialize");
        assert_eq!(value["type"], "create_ticket");
        assert_eq!(value["status"], "pending");
        assert_eq!(value["tasks"][0]["type"], "github_create_issue");
    }
}
