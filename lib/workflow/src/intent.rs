//! Classified user intents.
//!
//! An [`Intent`] is produced once per user message by the classifier and is
//! never mutated afterwards. The workflow factory only reads it.

use pmflow_core::IntentId;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// Broad category assigned by the intent classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    /// Create, update, or check the status of something.
    Execution,
    /// Trends, risks, and reviews.
    Analysis,
    /// Documents and summaries.
    Synthesis,
    /// Prioritization and planning.
    Strategy,
    /// Retrospectives and patterns.
    Learning,
}

impl IntentCategory {
    /// Returns the wire name of this category.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Execution => "execution",
            Self::Analysis => "analysis",
            Self::Synthesis => "synthesis",
            Self::Strategy => "strategy",
            Self::Learning => "learning",
        }
    }
}

impl fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured classification of a user's natural-language request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Unique identifier for this intent.
    #[serde(default)]
    pub id: IntentId,
    /// The category chosen by the classifier.
    pub category: IntentCategory,
    /// Free-form name of the requested operation (e.g. `create_issue`).
    pub action: String,
    /// Key/value data extracted from the user message.
    #[serde(default)]
    pub context: Map<String, JsonValue>,
    /// Classifier confidence in `[0, 1]`.
    #[serde(default, deserialize_with = "deserialize_confidence")]
    pub confidence: f64,
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

fn deserialize_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    f64::deserialize(deserializer).map(clamp_confidence)
}

impl Intent {
    /// Creates an intent with an empty context and zero confidence.
    #[must_use]
    pub fn new(category: IntentCategory, action: impl Into<String>) -> Self {
        Self {
            id: IntentId::new(),
            category,
            action: action.into(),
            context: Map::new(),
            confidence: 0.0,
        }
    }

    /// Adds a context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Sets the confidence, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }

    /// Returns the original user message, if the classifier kept it.
    #[must_use]
    pub fn original_message(&self) -> Option<&str> {
        self.context.get("original_message").and_then(JsonValue::as_str)
    }
}
