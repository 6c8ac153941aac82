//! Database repositories for pmflow.
//!
//! This module provides data access for:
//! - Workflows and their tasks
//! - Work items created by workflows

pub mod work_item;
pub mod workflow;

pub use workflow::PgRepository;
