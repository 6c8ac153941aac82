//! Wiring and command execution.

use crate::cli::Command;
use crate::config::AppConfig;
use crate::error::CliError;
use pmflow_ai::LlmClient;
use pmflow_core::WorkflowId;
use pmflow_integration::{
    EmptyKnowledgeBase, GitHubClient, IssueTracker, IssueTrackerError, UnconfiguredTracker,
};
use pmflow_tasks::{TaskServices, WorkItemStore, default_handlers};
use pmflow_workflow::{Intent, OrchestrationEngine, Workflow, WorkflowRepository};
use rootcause::prelude::Report;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

/// Printed when the intent maps to no workflow type.
pub const NO_WORKFLOW: &str = "no workflow needed";

/// Builds the handler capabilities from configuration.
///
/// Missing credentials do not stop the runner: tasks that need the missing
/// service fail with a "not configured" message instead.
pub fn build_services(config: &AppConfig, work_items: Arc<dyn WorkItemStore>) -> TaskServices {
    let tracker: Arc<dyn IssueTracker> = match GitHubClient::from_config(&config.github) {
        Ok(client) => Arc::new(client),
        Err(IssueTrackerError::NotConfigured { reason }) => {
            warn!(%reason, "GitHub integration disabled");
            Arc::new(UnconfiguredTracker::new(reason))
        }
        Err(e) => {
            warn!(error = %e, "GitHub integration disabled");
            Arc::new(UnconfiguredTracker::new(e.to_string()))
        }
    };

    TaskServices {
        completion: Arc::new(LlmClient::from_config(&config.llm)),
        tracker,
        knowledge: Arc::new(EmptyKnowledgeBase),
        work_items,
        default_repository: config.github.default_repository.clone(),
    }
}

/// Creates an engine over `repository` with a handler for every task type.
pub fn build_engine<R: WorkflowRepository>(
    repository: R,
    services: &TaskServices,
    config: &AppConfig,
) -> OrchestrationEngine<R> {
    OrchestrationEngine::new(repository, default_handlers(services), &config.engine)
}

/// Runs a command and returns the text to print.
pub async fn dispatch<R: WorkflowRepository>(
    engine: &OrchestrationEngine<R>,
    command: Command,
) -> Result<String, Report<CliError>> {
    match command {
        Command::Run { intent } => {
            let intent = parse_intent(&read_source(&intent).await?)?;
            match run_intent(engine, &intent).await? {
                Some(workflow) => render(&workflow),
                None => Ok(NO_WORKFLOW.to_string()),
            }
        }
        Command::Show { workflow_id } => render(&show(engine, &workflow_id).await?),
    }
}

/// Creates the workflow for an intent and executes it to a terminal state.
///
/// Returns `None` when the intent needs no workflow. A failed workflow is
/// still `Ok`; its failure is part of the returned state.
pub async fn run_intent<R: WorkflowRepository>(
    engine: &OrchestrationEngine<R>,
    intent: &Intent,
) -> Result<Option<Workflow>, Report<CliError>> {
    let created = engine
        .create_workflow_from_intent(intent)
        .await
        .map_err(|e| CliError::Engine {
            details: e.to_string(),
        })?;
    let Some(workflow) = created else {
        return Ok(None);
    };

    let done = engine
        .execute_workflow(workflow.id)
        .await
        .map_err(|e| CliError::Engine {
            details: e.to_string(),
        })?;
    info!(
        workflow_id = %done.id,
        status = %done.status,
        "workflow finished"
    );
    Ok(Some(done))
}

/// Loads a workflow by its printed id.
pub async fn show<R: WorkflowRepository>(
    engine: &OrchestrationEngine<R>,
    workflow_id: &str,
) -> Result<Workflow, Report<CliError>> {
    let id = WorkflowId::from_str(workflow_id).map_err(|e| CliError::Input {
        details: e.to_string(),
    })?;
    let workflow = engine
        .get_workflow(id)
        .await
        .map_err(|e| CliError::Engine {
            details: e.to_string(),
        })?;
    workflow.ok_or_else(|| {
        CliError::Input {
            details: format!("workflow not found: {id}"),
        }
        .into()
    })
}

/// Parses an intent from JSON.
pub fn parse_intent(json: &str) -> Result<Intent, Report<CliError>> {
    serde_json::from_str(json).map_err(|e| {
        CliError::Input {
            details: format!("intent is not valid JSON: {e}"),
        }
        .into()
    })
}

async fn read_source(source: &str) -> Result<String, Report<CliError>> {
    let read = if source == "-" {
        let mut buffer = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buffer)
            .await
            .map(|_| buffer)
    } else {
        tokio::fs::read_to_string(source).await
    };
    read.map_err(|e| {
        CliError::Input {
            details: format!("cannot read {source}: {e}"),
        }
        .into()
    })
}

fn render(workflow: &Workflow) -> Result<String, Report<CliError>> {
    serde_json::to_string_pretty(workflow).map_err(|e| {
        CliError::Input {
            details: format!("cannot serialize workflow: {e}"),
        }
        .into()
    })
}
