//! Issue tracker capability.

use crate::error::IssueTrackerError;
use crate::url::parse_issue_url;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An issue or pull request as read from the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Issue number within its repository.
    pub number: u64,
    /// Title.
    pub title: String,
    /// Body text; empty when the issue has none.
    pub body: String,
    /// `open` or `closed`.
    pub state: String,
    /// Label names.
    pub labels: Vec<String>,
    /// Assignee logins.
    pub assignees: Vec<String>,
    /// Author login.
    pub author: String,
    /// Browser URL.
    pub url: String,
    /// `owner/repo`.
    pub repository: String,
    /// Number of comments.
    pub comments: u64,
    /// True for pull requests.
    pub is_pull_request: bool,
    /// Creation timestamp as reported by the tracker.
    pub created_at: String,
    /// Last update timestamp as reported by the tracker.
    pub updated_at: String,
}

/// Summary of a newly created issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIssue {
    /// Issue number within its repository.
    pub number: u64,
    /// Title as stored.
    pub title: String,
    /// Browser URL.
    pub url: String,
    /// `open` for a new issue.
    pub state: String,
}

/// Creates and reads issues in an external tracker.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Creates an issue in `repository` (`owner/repo`).
    async fn create_issue(
        &self,
        repository: &str,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<CreatedIssue, IssueTrackerError>;

    /// Fetches an issue by repository and number.
    async fn get_issue(&self, repository: &str, number: u64) -> Result<Issue, IssueTrackerError>;

    /// Fetches an issue or pull request by its URL.
    async fn get_issue_by_url(&self, url: &str) -> Result<Issue, IssueTrackerError> {
        let issue_ref = parse_issue_url(url).ok_or_else(|| IssueTrackerError::InvalidUrl {
            url: url.to_string(),
        })?;
        self.get_issue(&issue_ref.repository(), issue_ref.number)
            .await
    }
}

/// Tracker used when no credentials are configured. Every call fails with
/// [`IssueTrackerError::NotConfigured`].
#[derive(Debug, Clone)]
pub struct UnconfiguredTracker {
    reason: String,
}

impl UnconfiguredTracker {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> IssueTrackerError {
        IssueTrackerError::NotConfigured {
            reason: self.reason.clone(),
        }
    }
}

#[async_trait]
impl IssueTracker for UnconfiguredTracker {
    async fn create_issue(
        &self,
        _repository: &str,
        _title: &str,
        _body: &str,
        _labels: &[String],
    ) -> Result<CreatedIssue, IssueTrackerError> {
        Err(self.error())
    }

    async fn get_issue(&self, _repository: &str, _number: u64) -> Result<Issue, IssueTrackerError> {
        Err(self.error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        requests: Mutex<Vec<(String, u64)>>,
    }

    #[async_trait]
    impl IssueTracker for Recorder {
        async fn create_issue(
            &self,
            _repository: &str,
            _title: &str,
            _body: &str,
            _labels: &[String],
        ) -> Result<CreatedIssue, IssueTrackerError> {
            Err(IssueTrackerError::Unauthorized)
        }

        async fn get_issue(
            &self,
            repository: &str,
            number: u64,
        ) -> Result<Issue, IssueTrackerError> {
            self.requests
                .lock()
                .unwrap()
                .push((repository.to_string(), number));
            Err(IssueTrackerError::NotFound {
                resource: format!("{repository}#{number}"),
            })
        }
    }

    #[tokio::test]
    async fn get_by_url_resolves_repository_and_number() {
        let tracker = Recorder {
            requests: Mutex::new(Vec::new()),
        };

        let err = tracker
            .get_issue_by_url("https://github.com/acme/shop/pull/12")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            IssueTrackerError::NotFound {
                resource: "acme/shop#12".to_string()
            }
        );
        assert_eq!(
            tracker.requests.lock().unwrap().as_slice(),
            &[("acme/shop".to_string(), 12)]
        );
    }

    #[tokio::test]
    async fn get_by_url_rejects_bad_url() {
        let tracker = Recorder {
            requests: Mutex::new(Vec::new()),
        };
        let err = tracker
            .get_issue_by_url("https://example.com/nope")
            .await
            .unwrap_err();
        assert!(matches!(err, IssueTrackerError::InvalidUrl { .. }));
        assert!(tracker.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unconfigured_tracker_always_fails() {
        let tracker = UnconfiguredTracker::new("no GitHub token configured");
        let err = tracker
            .create_issue("o/r", "t", "b", &[])
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "issue tracker not configured: no GitHub token configured"
        );
        assert!(tracker.get_issue_by_url("https://github.com/o/r/issues/1").await.is_err());
    }
}
