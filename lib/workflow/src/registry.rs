//! Bounded in-memory workflow cache.
//!
//! The repository is the source of truth. The registry keeps recently used
//! workflows in memory, each behind its own async mutex, and evicts the least
//! recently used entry when full. A caller holding a [`WorkflowHandle`] keeps
//! working on it after eviction.
//!
//! Workflows being executed are pinned: lookups keep returning the executing
//! handle even after LRU eviction, so the repository is never read back into a
//! second copy while a run is in flight.

use crate::execution::Workflow;
use lru::LruCache;
use pmflow_core::WorkflowId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Shared, lockable handle to a cached workflow.
pub type WorkflowHandle = Arc<Mutex<Workflow>>;

/// Engine tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of workflows kept in memory.
    #[serde(default = "default_registry_capacity")]
    pub registry_capacity: usize,
}

fn default_registry_capacity() -> usize {
    1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            registry_capacity: default_registry_capacity(),
        }
    }
}

/// LRU cache of workflow handles keyed by id.
pub struct WorkflowRegistry {
    entries: Mutex<LruCache<WorkflowId, WorkflowHandle>>,
    /// In-flight handles with their pin counts.
    pinned: Mutex<HashMap<WorkflowId, (WorkflowHandle, usize)>>,
}

impl WorkflowRegistry {
    /// Creates a registry holding at most `capacity` workflows. A zero
    /// capacity is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            pinned: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a registry sized from engine configuration.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.registry_capacity)
    }

    /// Caches a workflow and returns its handle.
    pub async fn insert(&self, workflow: Workflow) -> WorkflowHandle {
        let id = workflow.id;
        let handle = Arc::new(Mutex::new(workflow));
        self.push(id, Arc::clone(&handle)).await;
        handle
    }

    async fn push(&self, id: WorkflowId, handle: WorkflowHandle) {
        let evicted = self.entries.lock().await.push(id, handle);
        if let Some((evicted_id, _)) = evicted.filter(|(evicted_id, _)| *evicted_id != id) {
            debug!(workflow_id = %evicted_id, "evicted workflow from registry");
        }
    }

    /// Returns the cached handle, marking it most recently used.
    ///
    /// A pinned handle that was evicted is cached again and returned.
    pub async fn get(&self, id: WorkflowId) -> Option<WorkflowHandle> {
        let cached = self.entries.lock().await.get(&id).cloned();
        if cached.is_some() {
            return cached;
        }

        let pinned = self
            .pinned
            .lock()
            .await
            .get(&id)
            .map(|(handle, _)| Arc::clone(handle))?;
        self.push(id, Arc::clone(&pinned)).await;
        Some(pinned)
    }

    /// Keeps `handle` as the canonical copy of `id` until every pin is
    /// released. Returns the canonical handle, which is an earlier pinned
    /// handle if one exists.
    pub async fn pin(&self, id: WorkflowId, handle: &WorkflowHandle) -> WorkflowHandle {
        let mut pinned = self.pinned.lock().await;
        let entry = pinned
            .entry(id)
            .or_insert_with(|| (Arc::clone(handle), 0));
        entry.1 += 1;
        Arc::clone(&entry.0)
    }

    /// Releases one pin on `id`.
    pub async fn unpin(&self, id: WorkflowId) {
        let mut pinned = self.pinned.lock().await;
        if let Some(entry) = pinned.get_mut(&id) {
            entry.1 -= 1;
            if entry.1 == 0 {
                pinned.remove(&id);
            }
        }
    }

    /// Returns true if a run currently holds `id`.
    pub async fn is_pinned(&self, id: WorkflowId) -> bool {
        self.pinned.lock().await.contains_key(&id)
    }

    /// Returns a copy of the cached workflow.
    pub async fn snapshot(&self, id: WorkflowId) -> Option<Workflow> {
        let handle = self.get(id).await?;
        let workflow = handle.lock().await;
        Some(workflow.clone())
    }

    /// Returns true if the workflow is cached. Does not touch recency.
    pub async fn contains(&self, id: WorkflowId) -> bool {
        self.entries.lock().await.contains(&id)
    }

    /// Number of cached workflows.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns true if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::WorkflowType;
    use pmflow_core::IntentId;
    use serde_json::Map;

    fn workflow() -> Workflow {
        Workflow::new(WorkflowType::CreateTicket, IntentId::new(), Map::new())
    }

    #[tokio::test]
    async fn evicts_least_recently_used() {
        let registry = WorkflowRegistry::new(2);
        let a = workflow();
        let b = workflow();
        let c = workflow();
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);

        registry.insert(a).await;
        registry.insert(b).await;
        assert!(registry.get(a_id).await.is_some());
        registry.insert(c).await;

        assert_eq!(registry.len().await, 2);
        assert!(registry.contains(a_id).await);
        assert!(!registry.contains(b_id).await);
        assert!(registry.contains(c_id).await);
    }

    #[tokio::test]
    async fn handle_survives_eviction() {
        let registry = WorkflowRegistry::new(1);
        let first = workflow();
        let first_id = first.id;

        let handle = registry.insert(first).await;
        registry.insert(workflow()).await;

        assert!(!registry.contains(first_id).await);
        assert_eq!(handle.lock().await.id, first_id);
    }

    #[tokio::test]
    async fn pinned_handle_outlives_eviction() {
        let registry = WorkflowRegistry::new(1);
        let first = workflow();
        let first_id = first.id;

        let handle = registry.insert(first).await;
        registry.pin(first_id, &handle).await;
        registry.insert(workflow()).await;
        assert!(!registry.contains(first_id).await);

        let found = registry.get(first_id).await.unwrap();
        assert!(Arc::ptr_eq(&found, &handle));
        assert!(registry.contains(first_id).await);

        registry.unpin(first_id).await;
        assert!(!registry.is_pinned(first_id).await);
    }

    #[tokio::test]
    async fn pins_are_counted() {
        let registry = WorkflowRegistry::new(4);
        let wf = workflow();
        let id = wf.id;
        let handle = registry.insert(wf).await;
        let other = Arc::new(Mutex::new(workflow()));

        registry.pin(id, &handle).await;
        let canonical = registry.pin(id, &other).await;
        assert!(Arc::ptr_eq(&canonical, &handle));

        registry.unpin(id).await;
        assert!(registry.is_pinned(id).await);
        registry.unpin(id).await;
        assert!(!registry.is_pinned(id).await);
    }

    #[tokio::test]
    async fn zero_capacity_holds_one() {
        let registry = WorkflowRegistry::new(0);
        let wf = workflow();
        let id = wf.id;
        registry.insert(wf).await;
        assert_eq!(registry.snapshot(id).await.map(|w| w.id), Some(id));
    }

    #[test]
    fn config_default_capacity() {
        let config: EngineConfig = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.registry_capacity, 1024);
    }
}
