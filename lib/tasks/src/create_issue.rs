//! GITHUB_CREATE_ISSUE: files the request as a GitHub issue.

use crate::context::first_of;
use async_trait::async_trait;
use pmflow_integration::{IssueContentGenerator, IssueTracker};
use pmflow_workflow::{
    Task, TaskFailure, TaskHandler, TaskOutcome, TaskOutput, TaskType, Workflow,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

const NO_DESCRIPTION: &str = "No description provided";

pub struct CreateIssueHandler {
    tracker: Arc<dyn IssueTracker>,
    generator: IssueContentGenerator,
    default_repository: Option<String>,
}

impl CreateIssueHandler {
    #[must_use]
    pub fn new(tracker: Arc<dyn IssueTracker>, default_repository: Option<String>) -> Self {
        Self {
            tracker,
            generator: IssueContentGenerator::default(),
            default_repository: default_repository.filter(|r| !r.is_empty()),
        }
    }
}

#[async_trait]
impl TaskHandler for CreateIssueHandler {
    fn task_type(&self) -> TaskType {
        TaskType::GithubCreateIssue
    }

    async fn handle(&self, workflow: &Workflow, _task: &Task) -> TaskOutcome {
        let description = first_of(workflow, &["description", "original_message"])
            .unwrap_or(NO_DESCRIPTION);
        let repository = first_of(workflow, &["repository"])
            .or(self.default_repository.as_deref())
            .ok_or_else(|| {
                TaskFailure::new("no repository in context and no default repository configured")
            })?;

        let mut generator_context = workflow.context.clone();
        generator_context.insert("repository".to_string(), json!(repository));
        let content = self.generator.generate(description, &generator_context);

        let created = self
            .tracker
            .create_issue(repository, &content.title, &content.body, &content.labels)
            .await
            .map_err(|e| TaskFailure::new(e.to_string()))?;

        info!(
            workflow_id = %workflow.id,
            repository,
            issue_number = created.number,
            "issue created"
        );

        let mut output = TaskOutput::new();
        output.insert("issue_url".to_string(), json!(created.url));
        output.insert("issue_number".to_string(), json!(created.number));
        output.insert("issue_title".to_string(), json!(created.title));
        output.insert("labels".to_string(), json!(content.labels));
        Ok(output)
    }
}
