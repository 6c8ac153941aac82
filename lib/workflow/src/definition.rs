//! Workflow definitions.
//!
//! A workflow definition is the static template behind a workflow type: a
//! name, a description, and the ordered list of task types that every
//! instance of that type runs. Definitions are compiled in; the order given
//! here is the execution order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of workflow types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    /// File a ticket in the issue tracker.
    CreateTicket,
    /// Take a feature request from analysis to a tracked issue.
    CreateFeature,
    /// Analyze product metrics and report insights.
    AnalyzeMetrics,
    /// Produce a written report.
    GenerateReport,
    /// Review an existing tracker item.
    ReviewItem,
    /// Draft a strategy or plan.
    PlanStrategy,
    /// Capture a learning or pattern.
    LearnPattern,
    /// Rank backlog items.
    PrioritizeBacklog,
    /// Summarize progress for stakeholders.
    StakeholderUpdate,
}

impl WorkflowType {
    /// All workflow types, in declaration order.
    pub const ALL: [WorkflowType; 9] = [
        Self::CreateTicket,
        Self::CreateFeature,
        Self::AnalyzeMetrics,
        Self::GenerateReport,
        Self::ReviewItem,
        Self::PlanStrategy,
        Self::LearnPattern,
        Self::PrioritizeBacklog,
        Self::StakeholderUpdate,
    ];

    /// Returns the wire name of this type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateTicket => "create_ticket",
            Self::CreateFeature => "create_feature",
            Self::AnalyzeMetrics => "analyze_metrics",
            Self::GenerateReport => "generate_report",
            Self::ReviewItem => "review_item",
            Self::PlanStrategy => "plan_strategy",
            Self::LearnPattern => "learn_pattern",
            Self::PrioritizeBacklog => "prioritize_backlog",
            Self::StakeholderUpdate => "stakeholder_update",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Returns the static definition for this type.
    #[must_use]
    pub fn definition(&self) -> &'static WorkflowDefinition {
        match self {
            Self::CreateTicket => &CREATE_TICKET,
            Self::CreateFeature => &CREATE_FEATURE,
            Self::AnalyzeMetrics => &ANALYZE_METRICS,
            Self::GenerateReport => &GENERATE_REPORT,
            Self::ReviewItem => &REVIEW_ITEM,
            Self::PlanStrategy => &PLAN_STRATEGY,
            Self::LearnPattern => &LEARN_PATTERN,
            Self::PrioritizeBacklog => &PRIORITIZE_BACKLOG,
            Self::StakeholderUpdate => &STAKEHOLDER_UPDATE,
        }
    }
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of task types. Each names exactly one handler capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Run the original request through an LLM analysis prompt.
    AnalyzeRequest,
    /// Turn the analysis into concrete requirements.
    ExtractRequirements,
    /// Look up related work and blockers.
    IdentifyDependencies,
    /// Record an internal work item.
    CreateWorkItem,
    /// Draft a longer document.
    GenerateDocument,
    /// Condense earlier output into a summary.
    CreateSummary,
    /// Tell stakeholders about the outcome.
    NotifyStakeholders,
    /// Open an issue in GitHub.
    GithubCreateIssue,
    /// Critique an existing GitHub issue or pull request.
    AnalyzeGithubIssue,
}

impl TaskType {
    /// All task types, in declaration order.
    pub const ALL: [TaskType; 9] = [
        Self::AnalyzeRequest,
        Self::ExtractRequirements,
        Self::IdentifyDependencies,
        Self::CreateWorkItem,
        Self::GenerateDocument,
        Self::CreateSummary,
        Self::NotifyStakeholders,
        Self::GithubCreateIssue,
        Self::AnalyzeGithubIssue,
    ];

    /// Returns the wire name of this type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnalyzeRequest => "analyze_request",
            Self::ExtractRequirements => "extract_requirements",
            Self::IdentifyDependencies => "identify_dependencies",
            Self::CreateWorkItem => "create_work_item",
            Self::GenerateDocument => "generate_document",
            Self::CreateSummary => "create_summary",
            Self::NotifyStakeholders => "notify_stakeholders",
            Self::GithubCreateIssue => "github_create_issue",
            Self::AnalyzeGithubIssue => "analyze_github_issue",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static template for a workflow type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowDefinition {
    /// The type this definition instantiates.
    pub workflow_type: WorkflowType,
    /// Human-readable name.
    pub name: &'static str,
    /// What the workflow accomplishes.
    pub description: &'static str,
    /// Task types in execution order.
    pub task_sequence: &'static [TaskType],
}

static CREATE_TICKET: WorkflowDefinition = WorkflowDefinition {
    workflow_type: WorkflowType::CreateTicket,
    name: "Create Ticket",
    description: "File a single issue in the tracker",
    task_sequence: &[TaskType::GithubCreateIssue],
};

static CREATE_FEATURE: WorkflowDefinition = WorkflowDefinition {
    workflow_type: WorkflowType::CreateFeature,
    name: "Create Feature",
    description: "Analyze a feature request and track it end to end",
    task_sequence: &[
        TaskType::AnalyzeRequest,
        TaskType::ExtractRequirements,
        TaskType::IdentifyDependencies,
        TaskType::CreateWorkItem,
        TaskType::GithubCreateIssue,
        TaskType::NotifyStakeholders,
    ],
};

static ANALYZE_METRICS: WorkflowDefinition = WorkflowDefinition {
    workflow_type: WorkflowType::AnalyzeMetrics,
    name: "Analyze Metrics",
    description: "Analyze product metrics and share insights",
    task_sequence: &[
        TaskType::AnalyzeRequest,
        TaskType::GenerateDocument,
        TaskType::CreateSummary,
        TaskType::NotifyStakeholders,
    ],
};

static GENERATE_REPORT: WorkflowDefinition = WorkflowDefinition {
    workflow_type: WorkflowType::GenerateReport,
    name: "Generate Report",
    description: "Draft and summarize a report",
    task_sequence: &[
        TaskType::AnalyzeRequest,
        TaskType::GenerateDocument,
        TaskType::CreateSummary,
    ],
};

static REVIEW_ITEM: WorkflowDefinition = WorkflowDefinition {
    workflow_type: WorkflowType::ReviewItem,
    name: "Review Item",
    description: "Critique an existing GitHub issue",
    task_sequence: &[TaskType::AnalyzeGithubIssue],
};

static PLAN_STRATEGY: WorkflowDefinition = WorkflowDefinition {
    workflow_type: WorkflowType::PlanStrategy,
    name: "Plan Strategy",
    description: "Turn a strategic question into a written plan",
    task_sequence: &[
        TaskType::AnalyzeRequest,
        TaskType::ExtractRequirements,
        TaskType::IdentifyDependencies,
        TaskType::GenerateDocument,
    ],
};

static LEARN_PATTERN: WorkflowDefinition = WorkflowDefinition {
    workflow_type: WorkflowType::LearnPattern,
    name: "Learn Pattern",
    description: "Capture what worked as a reusable summary",
    task_sequence: &[TaskType::AnalyzeRequest, TaskType::CreateSummary],
};

static PRIORITIZE_BACKLOG: WorkflowDefinition = WorkflowDefinition {
    workflow_type: WorkflowType::PrioritizeBacklog,
    name: "Prioritize Backlog",
    description: "Rank backlog items against dependencies",
    task_sequence: &[
        TaskType::AnalyzeRequest,
        TaskType::IdentifyDependencies,
        TaskType::CreateSummary,
    ],
};

static STAKEHOLDER_UPDATE: WorkflowDefinition = WorkflowDefinition {
    workflow_type: WorkflowType::StakeholderUpdate,
    name: "Stakeholder Update",
    description: "Summarize progress and notify stakeholders",
    task_sequence: &[TaskType::CreateSummary, TaskType::NotifyStakeholders],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_has_a_non_empty_definition() {
        for workflow_type in WorkflowType::ALL {
            let definition = workflow_type.definition();
            assert_eq!(definition.workflow_type, workflow_type);
            assert!(!definition.task_sequence.is_empty(), "{workflow_type}");
        }
    }

    #[test]
    fn single_step_definitions() {
        assert_eq!(
            WorkflowType::CreateTicket.definition().task_sequence,
            &[TaskType::GithubCreateIssue]
        );
        assert_eq!(
            WorkflowType::ReviewItem.definition().task_sequence,
            &[TaskType::AnalyzeGithubIssue]
        );
    }

    #[test]
    fn wire_names_round_trip() {
        for task_type in TaskType::ALL {
            assert_eq!(TaskType::from_str_value(task_type.as_str()), Some(task_type));
        }
        for workflow_type in WorkflowType::ALL {
            assert_eq!(
                WorkflowType::from_str_value(workflow_type.as_str()),
                Some(workflow_type)
            );
        }
        assert_eq!(TaskType::from_str_value("jira_create_ticket"), None);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&TaskType::GithubCreateIssue).expect("serialize");
        assert_eq!(json, "\"github_create_issue\"");
    }
}
