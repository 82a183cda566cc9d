//! In-memory store and engine
//!
//! Used by the CLI to plan rule tables offline and by tests. The engine
//! enforces the same constraints as the browser's dynamic rule table:
//! positive ids, positive priorities, no duplicate ids, all-or-nothing
//! batches.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, Mutex};
use ua_core::rule::HeaderRule;

use crate::engine::{EngineError, RuleEngine, RuleMutation};
use crate::store::{ConfigStore, StorageChange, StoreError};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// Store
// =============================================================================

/// Shared in-memory key-value store. Clones see the same data.
#[derive(Clone)]
pub struct MemoryStore {
    values: Arc<Mutex<Map<String, Value>>>,
    changes: broadcast::Sender<StorageChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_values(Map::new())
    }

    pub fn with_values(values: Map<String, Value>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: Arc::new(Mutex::new(values)),
            changes,
        }
    }

    /// Change notifications for every subsequent `set`.
    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }

    /// Copy of everything stored.
    pub async fn dump(&self) -> Map<String, Value> {
        self.values.lock().await.clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl ConfigStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        let values = self.values.lock().await;
        Ok(keys
            .iter()
            .filter_map(|key| values.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, values: Map<String, Value>) -> Result<(), StoreError> {
        if values.is_empty() {
            return Ok(());
        }

        let changed_keys: Vec<String> = values.keys().cloned().collect();
        self.values.lock().await.extend(values);

        // No subscribers is fine
        let _ = self.changes.send(StorageChange::local(changed_keys));
        Ok(())
    }
}

// =============================================================================
// Engine
// =============================================================================

#[derive(Default)]
struct EngineState {
    rules: BTreeMap<i32, HeaderRule>,
    fail_next: Option<EngineError>,
    mutations: usize,
}

/// Shared in-memory dynamic rule table. Clones see the same table.
#[derive(Clone, Default)]
pub struct MemoryEngine {
    state: Arc<Mutex<EngineState>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine that already holds `rules`, e.g. left over from a previous run.
    pub fn with_rules(rules: Vec<HeaderRule>) -> Self {
        let state = EngineState {
            rules: rules.into_iter().map(|rule| (rule.id, rule)).collect(),
            ..EngineState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Installed rules ordered by id.
    pub async fn rules(&self) -> Vec<HeaderRule> {
        self.state.lock().await.rules.values().cloned().collect()
    }

    /// Make the next `mutate_rules` call fail without touching the table.
    pub async fn fail_next(&self, error: EngineError) {
        self.state.lock().await.fail_next = Some(error);
    }

    /// Number of mutations applied so far.
    pub async fn mutation_count(&self) -> usize {
        self.state.lock().await.mutations
    }
}

#[async_trait(?Send)]
impl RuleEngine for MemoryEngine {
    async fn list_rules(&self) -> Result<Vec<HeaderRule>, EngineError> {
        Ok(self.rules().await)
    }

    async fn mutate_rules(&self, mutation: RuleMutation) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        if let Some(error) = state.fail_next.take() {
            return Err(error);
        }

        let mut next = state.rules.clone();
        for id in &mutation.remove_ids {
            next.remove(id);
        }

        for rule in mutation.add_rules {
            if rule.id < 1 {
                return Err(EngineError::InvalidRule {
                    id: rule.id,
                    reason: "id must be positive".to_string(),
                });
            }
            if rule.priority < 1 {
                return Err(EngineError::InvalidRule {
                    id: rule.id,
                    reason: "priority must be positive".to_string(),
                });
            }
            if rule.resource_types.is_empty() {
                return Err(EngineError::InvalidRule {
                    id: rule.id,
                    reason: "resource types must not be empty".to_string(),
                });
            }
            if next.contains_key(&rule.id) {
                return Err(EngineError::IdConflict(rule.id));
            }
            next.insert(rule.id, rule);
        }

        state.rules = next;
        state.mutations += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use ua_core::rule::RuleId;
    use ua_core::types::ResourceTypes;

    use super::*;

    fn rule(id: RuleId, user_agent: &str) -> HeaderRule {
        HeaderRule {
            id: id.raw(),
            priority: 1,
            url_filter: "*".to_string(),
            resource_types: ResourceTypes::ALL,
            user_agent: user_agent.to_string(),
        }
    }

    #[tokio::test]
    async fn store_set_merges_and_notifies() {
        let store = MemoryStore::new();
        let mut changes = store.subscribe();

        let mut values = Map::new();
        values.insert("activeId".to_string(), json!("x"));
        store.set(values).await.unwrap();

        let got = store.get(&["activeId", "userAgents"]).await.unwrap();
        assert_eq!(got.get("activeId"), Some(&json!("x")));
        assert!(!got.contains_key("userAgents"));

        let change = changes.recv().await.unwrap();
        assert_eq!(change, StorageChange::local(["activeId"]));
    }

    #[tokio::test]
    async fn engine_removes_before_adding() {
        let engine = MemoryEngine::with_rules(vec![rule(RuleId::Manual, "Old/1.0")]);
        engine
            .mutate_rules(RuleMutation {
                remove_ids: vec![1],
                add_rules: vec![rule(RuleId::Manual, "New/1.0")],
            })
            .await
            .unwrap();

        let rules = engine.rules().await;
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].user_agent, "New/1.0");
        assert_eq!(engine.mutation_count().await, 1);
    }

    #[tokio::test]
    async fn engine_rejects_conflicts_atomically() {
        let engine = MemoryEngine::with_rules(vec![rule(RuleId::Manual, "Old/1.0")]);
        let err = engine
            .mutate_rules(RuleMutation {
                remove_ids: Vec::new(),
                add_rules: vec![rule(RuleId::Permanent(0), "A/1.0"), rule(RuleId::Manual, "B/1.0")],
            })
            .await
            .unwrap_err();

        assert_eq!(err, EngineError::IdConflict(1));
        let rules = engine.rules().await;
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].user_agent, "Old/1.0");
        assert_eq!(engine.mutation_count().await, 0);
    }

    #[tokio::test]
    async fn engine_injected_failure_is_one_shot() {
        let engine = MemoryEngine::new();
        engine.fail_next(EngineError::Host("quota".to_string())).await;

        let mutation = RuleMutation {
            remove_ids: Vec::new(),
            add_rules: vec![rule(RuleId::Manual, "A/1.0")],
        };
        assert!(engine.mutate_rules(mutation.clone()).await.is_err());
        assert!(engine.mutate_rules(mutation).await.is_ok());
        assert_eq!(engine.list_rule_ids().await.unwrap(), vec![1]);
    }
}
