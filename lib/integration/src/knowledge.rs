//! Knowledge search capability.

use crate::error::KnowledgeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// One document excerpt returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeHit {
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, JsonValue>,
}

impl KnowledgeHit {
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
        }
    }
}

/// Finds documents relevant to a query.
#[async_trait]
pub trait KnowledgeSearch: Send + Sync {
    /// Returns at most `n_results` hits, best first.
    async fn search(&self, query: &str, n_results: usize)
        -> Result<Vec<KnowledgeHit>, KnowledgeError>;
}

/// Knowledge base with no documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyKnowledgeBase;

#[async_trait]
impl KnowledgeSearch for EmptyKnowledgeBase {
    async fn search(
        &self,
        _query: &str,
        _n_results: usize,
    ) -> Result<Vec<KnowledgeHit>, KnowledgeError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_base_has_no_hits() {
        let hits = EmptyKnowledgeBase.search("payments", 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn hit_metadata_defaults_to_empty() {
        let hit: KnowledgeHit =
            serde_json::from_str(r#"{"content": "PRD: checkout"}"#).expect("deserialize");
        assert_eq!(hit, KnowledgeHit::new("PRD: checkout"));
    }
}
