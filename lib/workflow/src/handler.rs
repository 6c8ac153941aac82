//! Task handler contract.
//!
//! Each [`TaskType`] is served by exactly one [`TaskHandler`]. Handlers return
//! a [`TaskOutcome`]: expected failures (missing input, a rejected API call)
//! are `Err(TaskFailure)`, never panics. The engine still catches panics at
//! the task boundary and records them as failures.

use crate::definition::TaskType;
use crate::execution::{Task, Workflow};
use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Output of a successful task. Merged into the workflow context.
pub type TaskOutput = Map<String, JsonValue>;

/// The result of running a task handler.
pub type TaskOutcome = Result<TaskOutput, TaskFailure>;

/// A human-readable task failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    /// What went wrong.
    pub message: String,
}

impl TaskFailure {
    /// Creates a failure with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TaskFailure {}

/// Performs one unit of work for a task type.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// The task type this handler serves.
    fn task_type(&self) -> TaskType;

    /// Runs the task against a snapshot of its workflow.
    async fn handle(&self, workflow: &Workflow, task: &Task) -> TaskOutcome;
}

/// Dispatch table from task type to handler.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<TaskType, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its own task type, replacing any previous
    /// handler for that type.
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) -> &mut Self {
        self.handlers.insert(handler.task_type(), handler);
        self
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, handler: Arc<dyn TaskHandler>) -> Self {
        self.register(handler);
        self
    }

    /// Returns the handler for a task type.
    #[must_use]
    pub fn get(&self, task_type: TaskType) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(&task_type).cloned()
    }

    /// Returns true if a handler is registered for the type.
    #[must_use]
    pub fn contains(&self, task_type: TaskType) -> bool {
        self.handlers.contains_key(&task_type)
    }

    /// Task types with no registered handler, in declaration order.
    #[must_use]
    pub fn missing(&self) -> Vec<TaskType> {
        TaskType::ALL
            .into_iter()
            .filter(|t| !self.contains(*t))
            .collect()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.handlers.keys().map(TaskType::as_str).collect();
        types.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &types)
            .finish()
    }
}
