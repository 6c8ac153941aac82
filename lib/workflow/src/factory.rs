//! Maps intents to workflows.

use crate::definition::WorkflowType;
use crate::execution::Workflow;
use crate::intent::{Intent, IntentCategory};
use std::collections::HashMap;
use tracing::debug;

const DEFAULT_ACTIONS: &[(&str, WorkflowType)] = &[
    ("create_ticket", WorkflowType::CreateTicket),
    ("create_issue", WorkflowType::CreateTicket),
    ("create_github_issue", WorkflowType::CreateTicket),
    ("create_feature", WorkflowType::CreateFeature),
    ("analyze_metrics", WorkflowType::AnalyzeMetrics),
    ("generate_report", WorkflowType::GenerateReport),
    ("review_issue", WorkflowType::ReviewItem),
    ("review_item", WorkflowType::ReviewItem),
    ("analyze_github_issue", WorkflowType::ReviewItem),
    ("plan_strategy", WorkflowType::PlanStrategy),
    ("learn_pattern", WorkflowType::LearnPattern),
    ("prioritize_backlog", WorkflowType::PrioritizeBacklog),
    ("stakeholder_update", WorkflowType::StakeholderUpdate),
];

/// Resolves an intent to a workflow type and instantiates it.
///
/// Resolution tries the action registry first (keys are lower-cased), then
/// the per-category default. Learning intents have no default, so an
/// unmapped learning action produces no workflow.
#[derive(Debug, Clone)]
pub struct WorkflowFactory {
    actions: HashMap<String, WorkflowType>,
}

impl Default for WorkflowFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowFactory {
    /// Creates a factory with the built-in action registry.
    #[must_use]
    pub fn new() -> Self {
        let actions = DEFAULT_ACTIONS
            .iter()
            .map(|(action, workflow_type)| ((*action).to_string(), *workflow_type))
            .collect();
        Self { actions }
    }

    /// Maps an additional action name to a workflow type. Replaces any
    /// existing mapping for the same (lower-cased) action.
    pub fn register_action(&mut self, action: &str, workflow_type: WorkflowType) {
        self.actions.insert(action.to_lowercase(), workflow_type);
    }

    /// Returns the fallback type for a category.
    #[must_use]
    pub fn category_default(category: IntentCategory) -> Option<WorkflowType> {
        match category {
            IntentCategory::Execution => Some(WorkflowType::CreateTicket),
            IntentCategory::Analysis => Some(WorkflowType::ReviewItem),
            IntentCategory::Synthesis => Some(WorkflowType::GenerateReport),
            IntentCategory::Strategy => Some(WorkflowType::PlanStrategy),
            IntentCategory::Learning => None,
        }
    }

    /// Resolves the workflow type for an intent without instantiating it.
    #[must_use]
    pub fn resolve(&self, intent: &Intent) -> Option<WorkflowType> {
        self.actions
            .get(&intent.action.to_lowercase())
            .copied()
            .or_else(|| Self::category_default(intent.category))
    }

    /// Instantiates a pending workflow for the intent, or returns `None` when
    /// the intent needs no workflow. Every call yields a fresh workflow id.
    #[must_use]
    pub fn create_from_intent(&self, intent: &Intent) -> Option<Workflow> {
        let Some(workflow_type) = self.resolve(intent) else {
            debug!(
                action = %intent.action,
                category = %intent.category,
                "no workflow type for intent"
            );
            return None;
        };

        Some(Workflow::new(
            workflow_type,
            intent.id,
            intent.context.clone(),
        ))
    }
}
