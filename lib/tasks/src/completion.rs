//! Handlers that turn workflow context into an LLM prompt and store the reply.

use crate::context::{first_of, original_message, output};
use async_trait::async_trait;
use pmflow_ai::Completion;
use pmflow_workflow::{Task, TaskFailure, TaskHandler, TaskOutcome, TaskType, Workflow};
use std::sync::Arc;
use tracing::debug;

/// The LLM-backed steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStep {
    AnalyzeRequest,
    ExtractRequirements,
    GenerateDocument,
    CreateSummary,
}

impl CompletionStep {
    pub const ALL: [CompletionStep; 4] = [
        Self::AnalyzeRequest,
        Self::ExtractRequirements,
        Self::GenerateDocument,
        Self::CreateSummary,
    ];

    #[must_use]
    pub fn task_type(self) -> TaskType {
        match self {
            Self::AnalyzeRequest => TaskType::AnalyzeRequest,
            Self::ExtractRequirements => TaskType::ExtractRequirements,
            Self::GenerateDocument => TaskType::GenerateDocument,
            Self::CreateSummary => TaskType::CreateSummary,
        }
    }

    /// Model profile used for the completion.
    #[must_use]
    pub fn profile(self) -> &'static str {
        match self {
            Self::AnalyzeRequest | Self::ExtractRequirements => "analysis",
            Self::GenerateDocument => "reasoning",
            Self::CreateSummary => "summarization",
        }
    }

    /// Context key the reply is stored under.
    #[must_use]
    pub fn output_key(self) -> &'static str {
        match self {
            Self::AnalyzeRequest => "analysis",
            Self::ExtractRequirements => "requirements",
            Self::GenerateDocument => "document",
            Self::CreateSummary => "summary",
        }
    }

    fn prompt(self, workflow: &Workflow) -> Result<String, TaskFailure> {
        match self {
            Self::AnalyzeRequest => {
                let message = original_message(workflow)?;
                Ok(format!(
                    "Analyze this product management request. Identify the underlying goal \
                     and the open questions a PM should resolve first.\n\nRequest: {message}"
                ))
            }
            Self::ExtractRequirements => {
                let message = original_message(workflow)?;
                let analysis = workflow.context_str("analysis").unwrap_or("(none)");
                Ok(format!(
                    "Extract concrete, testable requirements from the request below. \
                     Answer with a bulleted list.\n\nRequest: {message}\n\nAnalysis:\n{analysis}"
                ))
            }
            Self::GenerateDocument => {
                let name = workflow.workflow_type.definition().name;
                let mut prompt = format!("Write a {name} document for the following request.\n");
                if let Some(message) = workflow.context_str("original_message") {
                    prompt.push_str(&format!("\nRequest: {message}\n"));
                }
                for key in ["analysis", "requirements"] {
                    if let Some(value) = workflow.context_str(key) {
                        prompt.push_str(&format!("\n{}:\n{value}\n", capitalize(key)));
                    }
                }
                Ok(prompt)
            }
            Self::CreateSummary => {
                let source = first_of(workflow, &["document", "analysis", "original_message"])
                    .ok_or_else(|| TaskFailure::new("nothing to summarize in workflow context"))?;
                Ok(format!(
                    "Summarize the following for stakeholders in a short paragraph.\n\n{source}"
                ))
            }
        }
    }
}

fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Runs one [`CompletionStep`].
pub struct CompletionHandler {
    step: CompletionStep,
    completion: Arc<dyn Completion>,
}

impl CompletionHandler {
    #[must_use]
    pub fn new(step: CompletionStep, completion: Arc<dyn Completion>) -> Self {
        Self { step, completion }
    }
}

#[async_trait]
impl TaskHandler for CompletionHandler {
    fn task_type(&self) -> TaskType {
        self.step.task_type()
    }

    async fn handle(&self, workflow: &Workflow, _task: &Task) -> TaskOutcome {
        let prompt = self.step.prompt(workflow)?;
        debug!(
            workflow_id = %workflow.id,
            step = ?self.step,
            profile = self.step.profile(),
            "requesting completion"
        );

        let text = self
            .completion
            .complete(self.step.profile(), &prompt, None)
            .await
            .map_err(|e| TaskFailure::new(e.to_string()))?;

        Ok(output(self.step.output_key(), text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedCompletion, workflow_with};
    use pmflow_ai::LlmError;
    use pmflow_workflow::WorkflowType;
    use serde_json::json;

    #[tokio::test]
    async fn analyze_request_stores_reply() {
        let completion = ScriptedCompletion::replying("Users want exports.");
        let handler = CompletionHandler::new(CompletionStep::AnalyzeRequest, completion.clone());
        let workflow = workflow_with(
            WorkflowType::CreateFeature,
            json!({"original_message": "We need CSV export"}),
        );

        let output = handler.handle(&workflow, &workflow.tasks[0]).await.unwrap();

        assert_eq!(output["analysis"], "Users want exports.");
        let calls = completion.calls();
        assert_eq!(calls[0].task_type, "analysis");
        assert!(calls[0].prompt.contains("We need CSV export"));
    }

    #[tokio::test]
    async fn requirements_read_previous_analysis() {
        let completion = ScriptedCompletion::replying("- export button");
        let handler =
            CompletionHandler::new(CompletionStep::ExtractRequirements, completion.clone());
        let workflow = workflow_with(
            WorkflowType::CreateFeature,
            json!({"original_message": "CSV export", "analysis": "Finance needs monthly data"}),
        );

        let output = handler.handle(&workflow, &workflow.tasks[1]).await.unwrap();

        assert_eq!(output["requirements"], "- export button");
        assert!(completion.calls()[0]
            .prompt
            .contains("Analysis:\nFinance needs monthly data"));
    }

    #[tokio::test]
    async fn document_uses_reasoning_profile() {
        let completion = ScriptedCompletion::replying("# Report");
        let handler = CompletionHandler::new(CompletionStep::GenerateDocument, completion.clone());
        let workflow = workflow_with(
            WorkflowType::GenerateReport,
            json!({"original_message": "Q3 churn", "analysis": "Churn rose"}),
        );

        let output = handler.handle(&workflow, &workflow.tasks[1]).await.unwrap();

        assert_eq!(output["document"], "# Report");
        let call = &completion.calls()[0];
        assert_eq!(call.task_type, "reasoning");
        assert!(call.prompt.contains("Analysis:\nChurn rose"));
        assert!(!call.prompt.contains("Requirements:"));
    }

    #[tokio::test]
    async fn summary_prefers_document() {
        let completion = ScriptedCompletion::replying("Short.");
        let handler = CompletionHandler::new(CompletionStep::CreateSummary, completion.clone());
        let workflow = workflow_with(
            WorkflowType::GenerateReport,
            json!({"original_message": "msg", "analysis": "analysis", "document": "full doc"}),
        );

        handler.handle(&workflow, &workflow.tasks[2]).await.unwrap();

        let call = &completion.calls()[0];
        assert_eq!(call.task_type, "summarization");
        assert!(call.prompt.ends_with("full doc"));
    }

    #[tokio::test]
    async fn missing_message_fails_without_calling_llm() {
        let completion = ScriptedCompletion::replying("unused");
        let handler = CompletionHandler::new(CompletionStep::AnalyzeRequest, completion.clone());
        let workflow = workflow_with(WorkflowType::CreateFeature, json!({}));

        let failure = handler
            .handle(&workflow, &workflow.tasks[0])
            .await
            .unwrap_err();

        assert_eq!(failure.message, "no original_message in workflow context");
        assert!(completion.calls().is_empty());
    }

    #[tokio::test]
    async fn llm_error_becomes_failure() {
        let completion = ScriptedCompletion::failing(LlmError::Timeout);
        let handler = CompletionHandler::new(CompletionStep::CreateSummary, completion);
        let workflow = workflow_with(
            WorkflowType::StakeholderUpdate,
            json!({"original_message": "weekly update"}),
        );

        let failure = handler
            .handle(&workflow, &workflow.tasks[0])
            .await
            .unwrap_err();
        assert_eq!(failure.message, "LLM request timed out");
    }

    #[test]
    fn steps_cover_distinct_task_types() {
        let types: Vec<TaskType> = CompletionStep::ALL.iter().map(|s| s.task_type()).collect();
        for (i, t) in types.iter().enumerate() {
            assert!(!types[i + 1..].contains(t));
        }
    }
}
