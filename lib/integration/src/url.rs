//! GitHub issue and pull request URLs.
//!
//! Accepted forms, with or without scheme and `www.`:
//! `github.com/<owner>/<repo>/issues/<n>` and `github.com/<owner>/<repo>/pull/<n>`.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static ISSUE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:https?://)?(?:www\.)?github\.com/([^/\s]+)/([^/\s]+)/(?:issues|pull)/(\d+)")
        .expect("issue URL pattern is valid")
});

static EMBEDDED_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:https?://)?(?:www\.)?github\.com/[^/\s]+/[^/\s]+/(?:issues|pull)/\d+")
        .expect("embedded URL pattern is valid")
});

/// A reference to one issue or pull request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IssueRef {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Issue or pull request number.
    pub number: u64,
}

impl IssueRef {
    /// Returns `owner/repo`.
    #[must_use]
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// Parses an issue or pull request URL.
#[must_use]
pub fn parse_issue_url(url: &str) -> Option<IssueRef> {
    let captures = ISSUE_URL.captures(url.trim())?;
    let number = captures[3].parse().ok()?;
    Some(IssueRef {
        owner: captures[1].to_string(),
        repo: captures[2].to_string(),
        number,
    })
}

/// Returns the first issue or pull request URL embedded in free text.
#[must_use]
pub fn find_issue_url(text: &str) -> Option<&str> {
    EMBEDDED_URL.find(text).map(|m| m.as_str())
}
