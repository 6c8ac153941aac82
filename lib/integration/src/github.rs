//! GitHub REST API issue tracker.

use crate::error::IssueTrackerError;
use crate::tracker::{CreatedIssue, Issue, IssueTracker};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = "pmflow";

fn default_api_base() -> String {
    API_BASE.to_string()
}

/// GitHub connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Personal access token or app token.
    #[serde(default)]
    pub token: Option<String>,
    /// Repository (`owner/repo`) used when a request names none.
    #[serde(default)]
    pub default_repository: Option<String>,
    /// REST API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            default_repository: None,
            api_base: default_api_base(),
        }
    }
}

/// Issue tracker backed by the GitHub REST API.
pub struct GitHubClient {
    client: Client,
    token: String,
    api_base: String,
}

impl GitHubClient {
    /// Creates a client authenticated with `token`.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            api_base: API_BASE.to_string(),
        }
    }

    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` when no token is set.
    pub fn from_config(config: &GitHubConfig) -> Result<Self, IssueTrackerError> {
        let token = config
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| IssueTrackerError::NotConfigured {
                reason: "no GitHub token configured".to_string(),
            })?;
        info!(api_base = %config.api_base, "GitHub client initialized");
        Ok(Self::new(token).with_api_base(config.api_base.clone()))
    }

    /// Points the client at a different API base URL.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        resource: &str,
    ) -> Result<Response, IssueTrackerError> {
        let response = self
            .request(builder)
            .send()
            .await
            .map_err(|e| IssueTrackerError::RequestFailed {
                reason: e.to_string(),
            })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let rate_limit_exhausted = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "0");
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, rate_limit_exhausted, &body, resource))
    }
}

fn status_error(
    status: StatusCode,
    rate_limit_exhausted: bool,
    body: &str,
    resource: &str,
) -> IssueTrackerError {
    match status {
        StatusCode::UNAUTHORIZED => IssueTrackerError::Unauthorized,
        StatusCode::FORBIDDEN if rate_limit_exhausted => IssueTrackerError::RateLimited,
        StatusCode::TOO_MANY_REQUESTS => IssueTrackerError::RateLimited,
        StatusCode::NOT_FOUND => IssueTrackerError::NotFound {
            resource: resource.to_string(),
        },
        _ => {
            let message = serde_json::from_str::<ApiErrorBody>(body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_string()
                });
            IssueTrackerError::Api {
                status: status.as_u16(),
                message,
            }
        }
    }
}

fn validate_repository(repository: &str) -> Result<(), IssueTrackerError> {
    let mut parts = repository.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => Ok(()),
        _ => Err(IssueTrackerError::InvalidInput {
            reason: format!("repository must be 'owner/repo', got '{repository}'"),
        }),
    }
}

#[async_trait]
impl IssueTracker for GitHubClient {
    async fn create_issue(
        &self,
        repository: &str,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<CreatedIssue, IssueTrackerError> {
        validate_repository(repository)?;
        if title.trim().is_empty() {
            return Err(IssueTrackerError::InvalidInput {
                reason: "issue title must not be empty".to_string(),
            });
        }

        let payload = CreateIssueRequest {
            title,
            body,
            labels,
        };
        let url = self.api_url(&format!("/repos/{repository}/issues"));
        let response = self
            .send(self.client.post(url).json(&payload), repository)
            .await?;
        let issue: ApiIssue = response
            .json()
            .await
            .map_err(|e| IssueTrackerError::RequestFailed {
                reason: format!("invalid issue response: {e}"),
            })?;

        info!(repository, number = issue.number, "created GitHub issue");
        Ok(CreatedIssue {
            number: issue.number,
            title: issue.title,
            url: issue.html_url,
            state: issue.state,
        })
    }

    async fn get_issue(&self, repository: &str, number: u64) -> Result<Issue, IssueTrackerError> {
        validate_repository(repository)?;
        debug!(repository, number, "fetching GitHub issue");

        let url = self.api_url(&format!("/repos/{repository}/issues/{number}"));
        let response = self
            .send(self.client.get(url), &format!("{repository}#{number}"))
            .await?;
        let issue: ApiIssue = response
            .json()
            .await
            .map_err(|e| IssueTrackerError::RequestFailed {
                reason: format!("invalid issue response: {e}"),
            })?;
        Ok(issue.into_issue(repository))
    }
}

#[derive(Debug, Serialize)]
struct CreateIssueRequest<'a> {
    title: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "no_labels")]
    labels: &'a [String],
}

fn no_labels(labels: &&[String]) -> bool {
    labels.is_empty()
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiIssue {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: String,
    html_url: String,
    #[serde(default)]
    labels: Vec<ApiLabel>,
    #[serde(default)]
    assignees: Vec<ApiUser>,
    #[serde(default)]
    user: Option<ApiUser>,
    #[serde(default)]
    comments: u64,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    updated_at: String,
}

#[derive(Debug, Deserialize)]
struct ApiLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

impl ApiIssue {
    fn into_issue(self, repository: &str) -> Issue {
        Issue {
            number: self.number,
            title: self.title,
            body: self.body.unwrap_or_default(),
            state: self.state,
            labels: self.labels.into_iter().map(|l| l.name).collect(),
            assignees: self.assignees.into_iter().map(|u| u.login).collect(),
            author: self.user.map(|u| u.login).unwrap_or_default(),
            url: self.html_url,
            repository: repository.to_string(),
            comments: self.comments,
            is_pull_request: self.pull_request.is_some(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
