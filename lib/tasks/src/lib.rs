//! Task handlers for pmflow workflows.
//!
//! One handler per task type. Handlers read their inputs from the shared
//! workflow context and return outputs that the engine merges back into it:
//!
//! | Task type | Reads | Writes |
//! |---|---|---|
//! | `analyze_request` | `original_message` | `analysis` |
//! | `extract_requirements` | `original_message`, `analysis` | `requirements` |
//! | `identify_dependencies` | `requirements` or `original_message` | `dependencies` |
//! | `create_work_item` | `original_message`, `requirements` | `work_item_id`, `title` |
//! | `generate_document` | `original_message`, `analysis`, `requirements` | `document` |
//! | `create_summary` | `document`, `analysis` or `original_message` | `summary` |
//! | `notify_stakeholders` | `summary` | `notified`, `notification` |
//! | `github_create_issue` | `description` or `original_message`, `repository`, `user_impact` | `issue_url`, `issue_number`, `issue_title`, `labels` |
//! | `analyze_github_issue` | `github_url`, `issue_url` or `original_message` | `issue`, `issue_analysis` |

pub mod analyzer;
mod context;
pub mod completion;
pub mod create_issue;
pub mod critique;
pub mod dependencies;
pub mod notify;
pub mod work_item;

#[cfg(test)]
mod testing;

pub use analyzer::{AnalysisMetadata, AnalyzeIssueHandler, IssueAnalysis, IssueAnalyzer};
pub use completion::{CompletionHandler, CompletionStep};
pub use create_issue::CreateIssueHandler;
pub use critique::Critique;
pub use dependencies::IdentifyDependenciesHandler;
pub use notify::NotifyStakeholdersHandler;
pub use work_item::{CreateWorkItemHandler, InMemoryWorkItemStore, WorkItem, WorkItemStore};

use pmflow_ai::Completion;
use pmflow_integration::{IssueTracker, KnowledgeSearch};
use pmflow_workflow::HandlerRegistry;
use std::sync::Arc;

/// External capabilities the handlers call into.
#[derive(Clone)]
pub struct TaskServices {
    pub completion: Arc<dyn Completion>,
    pub tracker: Arc<dyn IssueTracker>,
    pub knowledge: Arc<dyn KnowledgeSearch>,
    pub work_items: Arc<dyn WorkItemStore>,
    /// Repository used for new issues when the context names none.
    pub default_repository: Option<String>,
}

/// Builds a registry with a handler for every task type.
#[must_use]
pub fn default_handlers(services: &TaskServices) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    for step in CompletionStep::ALL {
        registry.register(Arc::new(CompletionHandler::new(
            step,
            services.completion.clone(),
        )));
    }
    registry
        .register(Arc::new(IdentifyDependenciesHandler::new(
            services.knowledge.clone(),
        )))
        .register(Arc::new(CreateWorkItemHandler::new(
            services.work_items.clone(),
        )))
        .register(Arc::new(NotifyStakeholdersHandler))
        .register(Arc::new(CreateIssueHandler::new(
            services.tracker.clone(),
            services.default_repository.clone(),
        )))
        .register(Arc::new(AnalyzeIssueHandler::new(IssueAnalyzer::new(
            services.tracker.clone(),
            services.completion.clone(),
            services.knowledge.clone(),
        ))));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeKnowledge, FakeTracker, ScriptedCompletion, sample_issue};
    use pmflow_integration::IssueTrackerError;
    use pmflow_workflow::{
        EngineConfig, InMemoryRepository, Intent, IntentCategory, OrchestrationEngine,
        TaskStatus, TaskType, WorkflowStatus,
    };
    use serde_json::json;

    const CRITIQUE: &str = "SUMMARY:\n- a\n- b\n- c\nDRAFT_COMMENT:\nhi\nDRAFT_REWRITE:\nbody\nCONFIDENCE: 0.8";

    fn services(tracker: Arc<FakeTracker>, completion: Arc<ScriptedCompletion>) -> TaskServices {
        TaskServices {
            completion,
            tracker,
            knowledge: FakeKnowledge::with_hits(&["Checkout PRD"]),
            work_items: Arc::new(InMemoryWorkItemStore::new()),
            default_repository: Some("acme/shop".to_string()),
        }
    }

    fn engine(services: &TaskServices) -> OrchestrationEngine<InMemoryRepository> {
        OrchestrationEngine::new(
            InMemoryRepository::new(),
            default_handlers(services),
            &EngineConfig::default(),
        )
    }

    #[test]
    fn every_task_type_has_a_handler() {
        let services = services(
            Arc::new(FakeTracker::default()),
            ScriptedCompletion::replying("ok"),
        );
        let registry = default_handlers(&services);
        assert!(registry.missing().is_empty());
        for task_type in TaskType::ALL {
            assert_eq!(registry.get(task_type).unwrap().task_type(), task_type);
        }
    }

    #[tokio::test]
    async fn ticket_intent_creates_issue() {
        let tracker = Arc::new(FakeTracker::default());
        let engine = engine(&services(tracker.clone(), ScriptedCompletion::replying("ok")));
        let intent = Intent::new(IntentCategory::Execution, "create_issue");

        let workflow = engine
            .create_workflow_from_intent(&intent)
            .await
            .unwrap()
            .unwrap();
        let done = engine.execute_workflow(workflow.id).await.unwrap();

        assert_eq!(done.status, WorkflowStatus::Completed);
        assert_eq!(done.tasks[0].status, TaskStatus::Completed);
        assert_eq!(
            done.context["issue_url"],
            "https://github.com/acme/shop/issues/1"
        );
        assert_eq!(tracker.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejected_issue_fails_workflow() {
        let tracker = FakeTracker::rejecting_creates(IssueTrackerError::Api {
            status: 422,
            message: "validation failed".to_string(),
        });
        let engine = engine(&services(tracker, ScriptedCompletion::replying("ok")));
        let intent = Intent::new(IntentCategory::Execution, "create_issue")
            .with_context("original_message", json!("checkout button broken"));

        let workflow = engine
            .create_workflow_from_intent(&intent)
            .await
            .unwrap()
            .unwrap();
        let done = engine.execute_workflow(workflow.id).await.unwrap();

        assert_eq!(done.status, WorkflowStatus::Failed);
        assert_eq!(done.tasks[0].error.as_deref(), Some("422 validation failed"));
        assert!(done.error.as_deref().unwrap().contains("422 validation failed"));
    }

    #[tokio::test]
    async fn review_intent_produces_three_point_summary() {
        let tracker = FakeTracker::with_issue(sample_issue());
        let engine = engine(&services(tracker, ScriptedCompletion::replying(CRITIQUE)));
        let intent = Intent::new(IntentCategory::Analysis, "analyze_github_issue")
            .with_context("github_url", json!("https://github.com/o/r/issues/1"));

        let workflow = engine
            .create_workflow_from_intent(&intent)
            .await
            .unwrap()
            .unwrap();
        let done = engine.execute_workflow(workflow.id).await.unwrap();

        assert_eq!(done.status, WorkflowStatus::Completed);
        let result = done.tasks[0].result.as_ref().unwrap();
        assert_eq!(result["issue_analysis"]["summary"], json!(["a", "b", "c"]));
        assert_eq!(result["issue_analysis"]["confidence"], 0.8);
    }

    #[tokio::test]
    async fn review_without_url_fails() {
        let tracker = FakeTracker::with_issue(sample_issue());
        let engine = engine(&services(tracker, ScriptedCompletion::replying(CRITIQUE)));
        let intent = Intent::new(IntentCategory::Analysis, "analyze_github_issue")
            .with_context("original_message", json!("please look into this"));

        let workflow = engine
            .create_workflow_from_intent(&intent)
            .await
            .unwrap()
            .unwrap();
        let done = engine.execute_workflow(workflow.id).await.unwrap();

        assert_eq!(done.status, WorkflowStatus::Failed);
        assert!(done.tasks[0]
            .error
            .as_deref()
            .unwrap()
            .starts_with("No GitHub URL found"));
    }

    #[tokio::test]
    async fn feature_workflow_threads_context() {
        let tracker = Arc::new(FakeTracker::default());
        let completion = ScriptedCompletion::replying("- export to CSV");
        let work_items = InMemoryWorkItemStore::new();
        let services = TaskServices {
            work_items: Arc::new(work_items.clone()),
            ..services(tracker.clone(), completion.clone())
        };
        let engine = engine(&services);
        let intent = Intent::new(IntentCategory::Execution, "create_feature")
            .with_context("original_message", json!("add CSV export to reports"));

        let workflow = engine
            .create_workflow_from_intent(&intent)
            .await
            .unwrap()
            .unwrap();
        let done = engine.execute_workflow(workflow.id).await.unwrap();

        assert_eq!(done.status, WorkflowStatus::Completed);
        assert!(done.tasks.iter().all(|t| t.status == TaskStatus::Completed));
        assert_eq!(done.context["dependencies"], json!(["Checkout PRD"]));
        assert_eq!(done.context["notified"], true);

        let items = work_items.items().await;
        assert_eq!(items[0].description, "- export to CSV");
        assert_eq!(tracker.created.lock().unwrap()[0].repository, "acme/shop");
        let profiles: Vec<String> = completion.calls().into_iter().map(|c| c.task_type).collect();
        assert_eq!(profiles, vec!["analysis", "analysis"]);
    }
}
