//! Template-based issue content.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

const TITLE_PREFIXES: &[&str] = &[
    "create a ticket for",
    "users are complaining",
    "we need to",
    "can we",
];
const MAX_TITLE_CHARS: usize = 80;

// First match wins.
const TYPE_LABELS: &[(&str, &[&str])] = &[
    ("bug", &["bug", "error", "crash", "broken", "fail"]),
    ("enhancement", &["feature", "add", "new", "enhance"]),
    ("mobile", &["mobile", "ios", "android"]),
    ("authentication", &["login", "auth", "authentication"]),
];
const HIGH_PRIORITY: &[&str] = &["urgent", "critical", "production", "down"];
const LOW_PRIORITY: &[&str] = &["minor", "small", "typo"];

/// Title, body and labels for a new issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueContent {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

/// Builds issue content from a free-text description.
#[derive(Debug, Clone)]
pub struct IssueContentGenerator {
    created_via: String,
}

impl Default for IssueContentGenerator {
    fn default() -> Self {
        Self {
            created_via: "pmflow".to_string(),
        }
    }
}

impl IssueContentGenerator {
    /// Creates a generator that signs issues with `created_via`.
    #[must_use]
    pub fn new(created_via: impl Into<String>) -> Self {
        Self {
            created_via: created_via.into(),
        }
    }

    /// Generates content for `description`.
    ///
    /// Reads `repository` and `user_impact` from `context` when present.
    #[must_use]
    pub fn generate(&self, description: &str, context: &Map<String, JsonValue>) -> IssueContent {
        IssueContent {
            title: title_for(description),
            body: self.body_for(description, context),
            labels: labels_for(description),
        }
    }

    fn body_for(&self, description: &str, context: &Map<String, JsonValue>) -> String {
        let mut body = format!("## Description\n{description}\n\n");

        if let Some(impact) = context_str(context, "user_impact") {
            body.push_str(&format!("## User Impact\n{impact}\n\n"));
        }

        body.push_str(
            "## Acceptance Criteria\n\
             - [ ] Issue is reproducible\n\
             - [ ] Root cause identified\n\
             - [ ] Fix implemented and tested\n\
             - [ ] No regression in existing functionality\n\n",
        );

        let repository = context_str(context, "repository").unwrap_or("Not specified");
        body.push_str(&format!(
            "## Additional Context\n- Repository: {repository}\n- Created via: {}",
            self.created_via
        ));
        body
    }
}

fn context_str<'a>(context: &'a Map<String, JsonValue>, key: &str) -> Option<&'a str> {
    context
        .get(key)
        .and_then(JsonValue::as_str)
        .filter(|s| !s.is_empty())
}

fn title_for(description: &str) -> String {
    let mut title = description.trim();
    for prefix in TITLE_PREFIXES {
        if title
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        {
            title = title[prefix.len()..].trim();
        }
    }

    let mut chars = title.chars();
    let mut title: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };

    if title.chars().count() > MAX_TITLE_CHARS {
        title = title.chars().take(MAX_TITLE_CHARS - 3).collect();
        title.push_str("...");
    }
    title
}

fn labels_for(description: &str) -> Vec<String> {
    let lower = description.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    let mut labels = Vec::with_capacity(2);
    if let Some((label, _)) = TYPE_LABELS.iter().find(|(_, words)| mentions(words)) {
        labels.push((*label).to_string());
    }

    let priority = if mentions(HIGH_PRIORITY) {
        "priority-high"
    } else if mentions(LOW_PRIORITY) {
        "priority-low"
    } else {
        "priority-medium"
    };
    labels.push(priority.to_string());
    labels
}
