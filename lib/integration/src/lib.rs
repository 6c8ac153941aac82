//! External integrations for pmflow.
//!
//! This crate provides:
//!
//! - **Issue tracker**: the [`IssueTracker`] capability and its GitHub client
//! - **Issue URLs**: parsing and discovery of GitHub issue/PR links
//! - **Issue content**: template-based titles, bodies and labels
//! - **Knowledge search**: the [`KnowledgeSearch`] capability

pub mod content;
pub mod error;
pub mod github;
pub mod knowledge;
pub mod tracker;
pub mod url;

pub use content::{IssueContent, IssueContentGenerator};
pub use error::{IssueTrackerError, KnowledgeError};
pub use github::{GitHubClient, GitHubConfig};
pub use knowledge::{EmptyKnowledgeBase, KnowledgeHit, KnowledgeSearch};
pub use tracker::{CreatedIssue, Issue, IssueTracker, UnconfiguredTracker};
pub use url::{IssueRef, find_issue_url, parse_issue_url};
