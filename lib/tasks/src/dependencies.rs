//! IDENTIFY_DEPENDENCIES: related knowledge for the request.

use crate::context::{first_of, output};
use async_trait::async_trait;
use pmflow_integration::KnowledgeSearch;
use pmflow_workflow::{Task, TaskFailure, TaskHandler, TaskOutcome, TaskType, Workflow};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::debug;

const MAX_RESULTS: usize = 5;

pub struct IdentifyDependenciesHandler {
    knowledge: Arc<dyn KnowledgeSearch>,
}

impl IdentifyDependenciesHandler {
    #[must_use]
    pub fn new(knowledge: Arc<dyn KnowledgeSearch>) -> Self {
        Self { knowledge }
    }
}

#[async_trait]
impl TaskHandler for IdentifyDependenciesHandler {
    fn task_type(&self) -> TaskType {
        TaskType::IdentifyDependencies
    }

    async fn handle(&self, workflow: &Workflow, _task: &Task) -> TaskOutcome {
        let query = first_of(workflow, &["requirements", "original_message"])
            .ok_or_else(|| TaskFailure::new("no requirements or original_message to search for"))?;

        let hits = self
            .knowledge
            .search(query, MAX_RESULTS)
            .await
            .map_err(|e| TaskFailure::new(e.to_string()))?;
        debug!(workflow_id = %workflow.id, hits = hits.len(), "dependency search finished");

        let snippets: Vec<JsonValue> = hits.into_iter().map(|h| h.content.into()).collect();
        Ok(output("dependencies", snippets))
    }
}
