//! Workflow orchestration engine for pmflow.
//!
//! This crate turns classified intents into persisted, ordered task lists and
//! executes them:
//!
//! - **Intents**: the classifier's output, consumed read-only
//! - **Definitions**: the static task sequence behind each workflow type
//! - **Factory**: intent action/category to workflow type resolution
//! - **Execution**: workflow and task state machines
//! - **Handlers**: the task handler contract and its dispatch table
//! - **Registry**: bounded in-memory cache over the repository
//! - **Orchestrator**: the sequential, fail-fast execution loop

pub mod definition;
pub mod error;
pub mod execution;
pub mod factory;
pub mod handler;
pub mod intent;
pub mod orchestrator;
pub mod registry;
pub mod repository;

pub use definition::{TaskType, WorkflowDefinition, WorkflowType};
pub use error::{EngineError, RepositoryError};
pub use execution::{Task, TaskStatus, TransitionError, Workflow, WorkflowStatus};
pub use factory::WorkflowFactory;
pub use handler::{HandlerRegistry, TaskFailure, TaskHandler, TaskOutcome, TaskOutput};
pub use intent::{Intent, IntentCategory};
pub use orchestrator::OrchestrationEngine;
pub use registry::{EngineConfig, WorkflowHandle, WorkflowRegistry};
pub use repository::{InMemoryRepository, Transition, WorkflowRepository};
