//! Error types for the command-line runner.

use std::fmt;

/// Errors surfaced by CLI commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// The database could not be reached or migrated.
    Database { details: String },
    /// The intent or workflow id given on the command line is unusable.
    Input { details: String },
    /// The engine rejected the request.
    Engine { details: String },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "configuration error: {details}"),
            Self::Database { details } => write!(f, "database error: {details}"),
            Self::Input { details } => write!(f, "invalid input: {details}"),
            Self::Engine { details } => write!(f, "engine error: {details}"),
        }
    }
}

impl std::error::Error for CliError {}
