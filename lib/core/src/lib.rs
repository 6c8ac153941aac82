//! Core domain identifiers and utilities for pmflow.
//!
//! This crate provides the identifier types and error handling alias shared
//! by the workflow engine, the task handlers, and the binaries.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{IntentId, ParseIdError, TaskId, WorkItemId, WorkflowId};
