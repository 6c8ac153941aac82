//! Error types for the workflow crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `RepositoryError`: returned by `WorkflowRepository` implementations
//! - `EngineError`: structural misuse or persistence faults surfaced by the
//!   orchestration engine, wrapped in a `Report` at the public boundary
//!
//! Task handler failures are not errors at this level. They become terminal
//! workflow state.

use crate::execution::{TransitionError, WorkflowStatus};
use pmflow_core::WorkflowId;
use std::fmt;

/// Errors from durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Could not reach the store.
    ConnectionFailed { message: String },
    /// A statement or transaction failed.
    QueryFailed { message: String },
    /// The record to update does not exist.
    NotFound { entity: &'static str, id: String },
    /// A stored row could not be mapped back to a domain value.
    InvalidRecord { message: String },
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { message } => {
                write!(f, "repository connection failed: {message}")
            }
            Self::QueryFailed { message } => write!(f, "repository query failed: {message}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidRecord { message } => write!(f, "invalid stored record: {message}"),
        }
    }
}

impl std::error::Error for RepositoryError {}

/// Errors surfaced by the orchestration engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No workflow with this id in the registry or the repository.
    WorkflowNotFound { workflow_id: WorkflowId },
    /// `execute_workflow` was called on a workflow that is not pending.
    AlreadyStarted {
        workflow_id: WorkflowId,
        status: WorkflowStatus,
    },
    /// A transition could not be written to the repository.
    Persistence {
        workflow_id: WorkflowId,
        details: String,
    },
    /// The in-memory state machine refused a transition.
    InvalidState {
        workflow_id: WorkflowId,
        details: String,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkflowNotFound { workflow_id } => {
                write!(f, "workflow not found: {workflow_id}")
            }
            Self::AlreadyStarted {
                workflow_id,
                status,
            } => write!(
                f,
                "workflow {workflow_id} cannot be executed: status is {status}"
            ),
            Self::Persistence {
                workflow_id,
                details,
            } => write!(f, "failed to persist workflow {workflow_id}: {details}"),
            Self::InvalidState {
                workflow_id,
                details,
            } => write!(f, "workflow {workflow_id} is in an invalid state: {details}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl EngineError {
    pub(crate) fn persistence(workflow_id: WorkflowId, e: &RepositoryError) -> Self {
        Self::Persistence {
            workflow_id,
            details: e.to_string(),
        }
    }

    pub(crate) fn invalid_state(workflow_id: WorkflowId, e: &TransitionError) -> Self {
        Self::InvalidState {
            workflow_id,
            details: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_workflow() {
        let workflow_id = WorkflowId::new();
        let err = EngineError::AlreadyStarted {
            workflow_id,
            status: WorkflowStatus::Running,
        };
        assert_eq!(
            err.to_string(),
            format!("workflow {workflow_id} cannot be executed: status is running")
        );

        let err = EngineError::persistence(
            workflow_id,
            &RepositoryError::QueryFailed {
                message: "deadlock".to_string(),
            },
        );
        assert!(err.to_string().ends_with("repository query failed: deadlock"));
    }
}
