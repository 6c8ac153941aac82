//! NOTIFY_STAKEHOLDERS: announces the workflow outcome.
//!
//! There is no delivery channel yet; the notification is written to the log.

use crate::context::first_of;
use async_trait::async_trait;
use pmflow_workflow::{Task, TaskHandler, TaskOutcome, TaskOutput, TaskType, Workflow};
use serde_json::json;
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct NotifyStakeholdersHandler;

#[async_trait]
impl TaskHandler for NotifyStakeholdersHandler {
    fn task_type(&self) -> TaskType {
        TaskType::NotifyStakeholders
    }

    async fn handle(&self, workflow: &Workflow, _task: &Task) -> TaskOutcome {
        let message = first_of(workflow, &["summary", "issue_url", "original_message"])
            .unwrap_or("workflow finished");

        info!(
            workflow_id = %workflow.id,
            workflow_type = workflow.workflow_type.as_str(),
            message,
            "notifying stakeholders"
        );

        let mut output = TaskOutput::new();
        output.insert("notified".to_string(), json!(true));
        output.insert("notification".to_string(), json!(message));
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::workflow_with;
    use pmflow_workflow::WorkflowType;

    #[tokio::test]
    async fn prefers_summary() {
        let workflow = workflow_with(
            WorkflowType::StakeholderUpdate,
            json!({"original_message": "weekly", "summary": "All green."}),
        );

        let output = NotifyStakeholdersHandler
            .handle(&workflow, &workflow.tasks[1])
            .await
            .unwrap();

        assert_eq!(output["notified"], true);
        assert_eq!(output["notification"], "All green.");
    }

    #[tokio::test]
    async fn succeeds_with_empty_context() {
        let workflow = workflow_with(WorkflowType::StakeholderUpdate, json!({}));
        let output = NotifyStakeholdersHandler
            .handle(&workflow, &workflow.tasks[1])
            .await
            .unwrap();
        assert_eq!(output["notification"], "workflow finished");
    }
}
