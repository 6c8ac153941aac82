//! Error types for the integration crate.
//!
//! - `IssueTrackerError`: errors from issue tracker operations
//! - `KnowledgeError`: errors from knowledge search
//!
//! Task handlers turn both into task failure messages, so the `Display`
//! output is what a user ends up reading.

use std::fmt;

/// Errors from issue tracker operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueTrackerError {
    /// The URL is not a recognizable issue or pull request URL.
    InvalidUrl { url: String },
    /// Parameters were rejected before any request was sent.
    InvalidInput { reason: String },
    /// No credentials configured.
    NotConfigured { reason: String },
    /// Authentication failed.
    Unauthorized,
    /// Rate limit exceeded.
    RateLimited,
    /// The issue or repository does not exist.
    NotFound { resource: String },
    /// The API returned an error status.
    Api { status: u16, message: String },
    /// The request could not be sent or the response could not be read.
    RequestFailed { reason: String },
}

impl fmt::Display for IssueTrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl { url } => write!(
                f,
                "invalid GitHub URL '{url}', expected https://github.com/owner/repo/issues/123"
            ),
            Self::InvalidInput { reason } => write!(f, "invalid input: {reason}"),
            Self::NotConfigured { reason } => write!(f, "issue tracker not configured: {reason}"),
            Self::Unauthorized => write!(f, "GitHub authentication failed"),
            Self::RateLimited => write!(f, "GitHub rate limit exceeded"),
            Self::NotFound { resource } => write!(f, "not found: {resource}"),
            Self::Api { status, message } => write!(f, "{status} {message}"),
            Self::RequestFailed { reason } => write!(f, "GitHub request failed: {reason}"),
        }
    }
}

impl std::error::Error for IssueTrackerError {}

/// Errors from knowledge search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KnowledgeError {
    /// The knowledge store cannot be reached.
    Unavailable { reason: String },
    /// The query failed.
    QueryFailed { reason: String },
}

impl fmt::Display for KnowledgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => write!(f, "knowledge base unavailable: {reason}"),
            Self::QueryFailed { reason } => write!(f, "knowledge query failed: {reason}"),
        }
    }
}

impl std::error::Error for KnowledgeError {}
