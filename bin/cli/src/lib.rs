//! Command-line runner for pmflow workflows.
//!
//! Wires configuration, storage, and the task handlers into an
//! [`OrchestrationEngine`](pmflow_workflow::OrchestrationEngine).

pub mod app;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
