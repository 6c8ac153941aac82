//! ANALYZE_GITHUB_ISSUE: critiques an existing issue against an ideal one.
//!
//! The analyzer fetches the issue, searches the knowledge base for related
//! material, generates an "ideal" version with [`IssueContentGenerator`] and
//! asks the LLM to compare the two. Knowledge search problems only reduce
//! the context given to the LLM. Fetch and completion errors fail the task.

use crate::context::{first_of, output, truncate_chars};
use crate::critique::Critique;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pmflow_ai::Completion;
use pmflow_integration::{
    Issue, IssueContent, IssueContentGenerator, IssueTracker, KnowledgeHit, KnowledgeSearch,
    find_issue_url,
};
use pmflow_workflow::{Task, TaskFailure, TaskHandler, TaskOutcome, TaskType, Workflow};
use serde::{Deserialize, Serialize};
use serde_json::{Map, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

const PROFILE: &str = "issue_analysis";
const KNOWLEDGE_RESULTS: usize = 5;
const PROMPT_KNOWLEDGE_ITEMS: usize = 3;
const PROMPT_BODY_CHARS: usize = 800;
const URL_KEYS: &[&str] = &["github_url", "issue_url"];
const NO_URL_MESSAGE: &str = "No GitHub URL found in the request. Include a link such as \
                              https://github.com/owner/repo/issues/123";

/// Result of analyzing one issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueAnalysis {
    #[serde(flatten)]
    pub critique: Critique,
    /// Excerpts of the knowledge hits that informed the critique.
    pub knowledge_context: Vec<String>,
    pub metadata: AnalysisMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub issue_number: u64,
    pub repository: String,
    pub original_labels: Vec<String>,
    pub knowledge_sources_used: usize,
    /// False when the LLM response had no recognizable sections.
    pub parsed: bool,
    pub analyzed_at: DateTime<Utc>,
}

/// Produces structured critiques of GitHub issues.
pub struct IssueAnalyzer {
    tracker: Arc<dyn IssueTracker>,
    completion: Arc<dyn Completion>,
    knowledge: Arc<dyn KnowledgeSearch>,
    generator: IssueContentGenerator,
}

impl IssueAnalyzer {
    #[must_use]
    pub fn new(
        tracker: Arc<dyn IssueTracker>,
        completion: Arc<dyn Completion>,
        knowledge: Arc<dyn KnowledgeSearch>,
    ) -> Self {
        Self {
            tracker,
            completion,
            knowledge,
            generator: IssueContentGenerator::default(),
        }
    }

    /// Fetches and analyzes the issue at `url`.
    pub async fn analyze_url(&self, url: &str) -> Result<(Issue, IssueAnalysis), TaskFailure> {
        let issue = self
            .tracker
            .get_issue_by_url(url)
            .await
            .map_err(|e| TaskFailure::new(format!("Failed to fetch issue: {e}")))?;
        let analysis = self.analyze(&issue).await?;
        Ok((issue, analysis))
    }

    /// Analyzes an already fetched issue.
    pub async fn analyze(&self, issue: &Issue) -> Result<IssueAnalysis, TaskFailure> {
        let knowledge = self.related_knowledge(issue).await;
        let ideal = self.ideal_issue(issue);
        let prompt = build_prompt(issue, &ideal, &knowledge);

        let mut llm_context = Map::new();
        llm_context.insert("issue_title".to_string(), json!(issue.title));
        llm_context.insert("repository".to_string(), json!(issue.repository));
        llm_context.insert(
            "knowledge_context".to_string(),
            json!(
                knowledge
                    .iter()
                    .map(|hit| truncate_chars(&hit.content, 200))
                    .collect::<Vec<_>>()
            ),
        );

        let response = self
            .completion
            .complete(PROFILE, &prompt, Some(&llm_context))
            .await
            .map_err(|e| TaskFailure::new(format!("Issue analysis failed: {e}")))?;

        let sections = Critique::parse_sections(&response);
        let parsed = sections.is_some();
        let critique = sections.unwrap_or_else(Critique::fallback);
        if !parsed {
            warn!(
                repository = %issue.repository,
                number = issue.number,
                response = %response,
                "issue critique had no recognizable sections"
            );
        }

        Ok(IssueAnalysis {
            critique,
            knowledge_context: knowledge
                .iter()
                .take(PROMPT_KNOWLEDGE_ITEMS)
                .map(|hit| format!("{}...", truncate_chars(&hit.content, 100)))
                .collect(),
            metadata: AnalysisMetadata {
                issue_number: issue.number,
                repository: issue.repository.clone(),
                original_labels: issue.labels.clone(),
                knowledge_sources_used: knowledge.len(),
                parsed,
                analyzed_at: Utc::now(),
            },
        })
    }

    async fn related_knowledge(&self, issue: &Issue) -> Vec<KnowledgeHit> {
        let query = format!("{} {}", issue.title, truncate_chars(&issue.body, 200));
        match self.knowledge.search(&query, KNOWLEDGE_RESULTS).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "knowledge search failed, analyzing without context");
                Vec::new()
            }
        }
    }

    fn ideal_issue(&self, issue: &Issue) -> IssueContent {
        let description = if issue.body.trim().is_empty() {
            &issue.title
        } else {
            &issue.body
        };
        let mut context = Map::new();
        context.insert("repository".to_string(), json!(issue.repository));
        self.generator.generate(description, &context)
    }
}

fn labels_line(labels: &[String]) -> String {
    if labels.is_empty() {
        "None".to_string()
    } else {
        labels.join(", ")
    }
}

fn build_prompt(
    issue: &Issue,
    ideal: &IssueContent,
    knowledge: &[KnowledgeHit],
) -> String {
    let knowledge_lines = knowledge
        .iter()
        .take(PROMPT_KNOWLEDGE_ITEMS)
        .map(|hit| format!("- {}...", truncate_chars(&hit.content, 150)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Analyze this GitHub issue and provide improvement suggestions.

ACTUAL ISSUE:
Title: {title}
Body: {body}
Labels: {labels}
Repository: {repository}

IDEAL COMPARISON:
Title: {ideal_title}
Body: {ideal_body}
Labels: {ideal_labels}

RELEVANT PM KNOWLEDGE:
{knowledge_lines}

Provide your analysis in this exact format:

SUMMARY:
- [First key observation about the issue quality]
- [Second key observation or missing element]
- [Third key observation or strength/weakness]

DRAFT_COMMENT:
[A constructive, professional comment that could be posted on the issue. Be specific about improvements while remaining encouraging.]

DRAFT_REWRITE:
[An improved version of the issue body with clearer structure and any missing elements. Keep the original intent.]

CONFIDENCE: [0.0-1.0]

Focus on PM best practices: clear problem statements, acceptance criteria, user impact, reproducible steps, and appropriate labeling.",
        title = issue.title,
        body = truncate_chars(&issue.body, PROMPT_BODY_CHARS),
        labels = labels_line(&issue.labels),
        repository = issue.repository,
        ideal_title = ideal.title,
        ideal_body = truncate_chars(&ideal.body, PROMPT_BODY_CHARS),
        ideal_labels = labels_line(&ideal.labels),
    )
}

/// Resolves the issue URL from the context, then from the original message.
fn target_url(workflow: &Workflow) -> Option<&str> {
    first_of(workflow, URL_KEYS).or_else(|| {
        workflow
            .context_str("original_message")
            .and_then(find_issue_url)
    })
}

pub struct AnalyzeIssueHandler {
    analyzer: IssueAnalyzer,
}

impl AnalyzeIssueHandler {
    #[must_use]
    pub fn new(analyzer: IssueAnalyzer) -> Self {
        Self { analyzer }
    }
}

#[async_trait]
impl TaskHandler for AnalyzeIssueHandler {
    fn task_type(&self) -> TaskType {
        TaskType::AnalyzeGithubIssue
    }

    async fn handle(&self, workflow: &Workflow, _task: &Task) -> TaskOutcome {
        let url = target_url(workflow).ok_or_else(|| TaskFailure::new(NO_URL_MESSAGE))?;
        debug!(workflow_id = %workflow.id, url, "analyzing issue");

        let (issue, analysis) = self.analyzer.analyze_url(url).await?;
        info!(
            workflow_id = %workflow.id,
            repository = %issue.repository,
            number = issue.number,
            confidence = analysis.critique.confidence,
            "issue analyzed"
        );

        let analysis = serde_json::to_value(&analysis)
            .map_err(|e| TaskFailure::new(format!("failed to encode analysis: {e}")))?;
        let mut result = output(
            "issue",
            json!({
                "number": issue.number,
                "title": issue.title,
                "repository": issue.repository,
                "url": issue.url,
                "state": issue.state,
                "labels": issue.labels,
            }),
        );
        result.insert("issue_analysis".to_string(), analysis);
        Ok(result)
    }
}
