//! Test doubles for the capabilities handlers depend on.

use async_trait::async_trait;
use pmflow_ai::{Completion, LlmError};
use pmflow_core::IntentId;
use pmflow_integration::{
    CreatedIssue, Issue, IssueTracker, IssueTrackerError, KnowledgeError, KnowledgeHit,
    KnowledgeSearch,
};
use pmflow_workflow::{Workflow, WorkflowType};
use serde_json::{Map, Value as JsonValue};
use std::sync::{Arc, Mutex};

pub(crate) fn workflow_with(workflow_type: WorkflowType, context: JsonValue) -> Workflow {
    let context = context.as_object().cloned().unwrap_or_default();
    Workflow::new(workflow_type, IntentId::new(), context)
}

/// One recorded completion call.
#[derive(Debug, Clone)]
pub(crate) struct CompletionCall {
    pub task_type: String,
    pub prompt: String,
    pub context: Option<Map<String, JsonValue>>,
}

/// Completion that answers with a fixed reply and records every call.
pub(crate) struct ScriptedCompletion {
    reply: Result<String, LlmError>,
    pub calls: Mutex<Vec<CompletionCall>>,
}

impl ScriptedCompletion {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(err: LlmError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(err),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<CompletionCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completion for ScriptedCompletion {
    async fn complete(
        &self,
        task_type: &str,
        prompt: &str,
        context: Option<&Map<String, JsonValue>>,
    ) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(CompletionCall {
            task_type: task_type.to_string(),
            prompt: prompt.to_string(),
            context: context.cloned(),
        });
        self.reply.clone()
    }
}

/// One recorded issue creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CreateCall {
    pub repository: String,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

/// Issue tracker holding a single fetchable issue.
#[derive(Default)]
pub(crate) struct FakeTracker {
    pub issue: Option<Issue>,
    pub create_error: Option<IssueTrackerError>,
    pub created: Mutex<Vec<CreateCall>>,
    pub fetched: Mutex<Vec<(String, u64)>>,
}

impl FakeTracker {
    pub fn with_issue(issue: Issue) -> Arc<Self> {
        Arc::new(Self {
            issue: Some(issue),
            ..Default::default()
        })
    }

    pub fn rejecting_creates(err: IssueTrackerError) -> Arc<Self> {
        Arc::new(Self {
            create_error: Some(err),
            ..Default::default()
        })
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn create_issue(
        &self,
        repository: &str,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<CreatedIssue, IssueTrackerError> {
        if let Some(err) = &self.create_error {
            return Err(err.clone());
        }
        let mut created = self.created.lock().unwrap();
        created.push(CreateCall {
            repository: repository.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            labels: labels.to_vec(),
        });
        let number = created.len() as u64;
        Ok(CreatedIssue {
            number,
            title: title.to_string(),
            url: format!("https://github.com/{repository}/issues/{number}"),
            state: "open".to_string(),
        })
    }

    async fn get_issue(&self, repository: &str, number: u64) -> Result<Issue, IssueTrackerError> {
        self.fetched
            .lock()
            .unwrap()
            .push((repository.to_string(), number));
        match &self.issue {
            Some(issue) if issue.repository == repository && issue.number == number => {
                Ok(issue.clone())
            }
            _ => Err(IssueTrackerError::NotFound {
                resource: format!("{repository}#{number}"),
            }),
        }
    }
}

/// Knowledge base with canned hits, or one that always fails.
pub(crate) struct FakeKnowledge {
    hits: Result<Vec<KnowledgeHit>, KnowledgeError>,
    pub queries: Mutex<Vec<(String, usize)>>,
}

impl FakeKnowledge {
    pub fn with_hits(contents: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            hits: Ok(contents.iter().map(|c| KnowledgeHit::new(*c)).collect()),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            hits: Err(KnowledgeError::Unavailable {
                reason: "index offline".to_string(),
            }),
            queries: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl KnowledgeSearch for FakeKnowledge {
    async fn search(
        &self,
        query: &str,
        n_results: usize,
    ) -> Result<Vec<KnowledgeHit>, KnowledgeError> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), n_results));
        self.hits
            .clone()
            .map(|hits| hits.into_iter().take(n_results).collect())
    }
}

pub(crate) fn sample_issue() -> Issue {
    Issue {
        number: 1,
        title: "Login broken".to_string(),
        body: "Users see a blank page after login.".to_string(),
        state: "open".to_string(),
        labels: vec!["bug".to_string()],
        assignees: Vec::new(),
        author: "sam".to_string(),
        url: "https://github.com/o/r/issues/1".to_string(),
        repository: "o/r".to_string(),
        comments: 0,
        is_pull_request: false,
        created_at: "2024-05-01T10:00:00Z".to_string(),
        updated_at: "2024-05-01T10:00:00Z".to_string(),
    }
}
