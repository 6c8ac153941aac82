//! Helpers for reading the shared workflow context.

use pmflow_workflow::{TaskFailure, TaskOutput, Workflow};
use serde_json::Value as JsonValue;

/// The user's message, required by most handlers.
pub(crate) fn original_message(workflow: &Workflow) -> Result<&str, TaskFailure> {
    workflow
        .context_str("original_message")
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| TaskFailure::new("no original_message in workflow context"))
}

/// The first non-empty string value among `keys`.
pub(crate) fn first_of<'a>(workflow: &'a Workflow, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| workflow.context_str(key))
        .find(|value| !value.trim().is_empty())
}

/// The first `max` characters of `text`.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// A single-entry task output.
pub(crate) fn output(key: &str, value: impl Into<JsonValue>) -> TaskOutput {
    let mut output = TaskOutput::new();
    output.insert(key.to_string(), value.into());
    output
}
