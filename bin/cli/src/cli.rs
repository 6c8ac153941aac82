//! Command-line surface.

use clap::{Parser, Subcommand};

/// Run and inspect pmflow workflows.
#[derive(Debug, Parser)]
#[command(name = "pmflow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Create the workflow for a classified intent and execute it.
    Run {
        /// Path to the intent JSON, or `-` for stdin.
        #[arg(long, value_name = "FILE")]
        intent: String,
    },
    /// Print the stored state of a workflow.
    Show {
        /// Workflow id (`wf_...`).
        workflow_id: String,
    },
}
