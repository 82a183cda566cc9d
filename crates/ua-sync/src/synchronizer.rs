//! Rule Synchronizer
//!
//! Reconciles one namespace of the engine's rule table with the rules the
//! planner wants. Each apply reads the installed ids, drops every id of its
//! own namespace and adds the planned rules back in one batch. Ids of the
//! other namespace are never listed for removal.
//!
//! The synchronizer does not serialize calls itself; callers must not run
//! two applies for the same namespace at once (see `Coordinator`).

use ua_compiler::{plan_manual_rule, plan_permanent_rules, SkippedEntry};
use ua_core::config::ConfigSnapshot;
use ua_core::rule::{HeaderRule, Namespace};
use ua_core::types::UserAgentProfile;

use crate::engine::{EngineError, NamespaceViolation, RuleEngine, RuleMutation};
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("Rule engine error: {0}")]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Namespace(#[from] NamespaceViolation),
    #[error("Configuration store error: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of one namespace rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub namespace: Namespace,
    pub removed: Vec<i32>,
    pub added: Vec<i32>,
    pub skipped: Vec<SkippedEntry>,
}

pub struct RuleSynchronizer<E> {
    engine: E,
}

impl<E: RuleEngine> RuleSynchronizer<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Replace the manual rule with the one `profile` calls for. A profile
    /// resolving to the native user-agent leaves the namespace empty, so
    /// requests fall through to any matching permanent spoof.
    pub async fn apply_manual_selection(
        &self,
        profile: Option<&UserAgentProfile>,
    ) -> Result<SyncReport, SyncError> {
        let rules: Vec<HeaderRule> = plan_manual_rule(profile).into_iter().collect();
        self.commit(Namespace::Manual, rules, Vec::new()).await
    }

    /// Rebuild the whole permanent namespace from the spoof list.
    pub async fn apply_permanent_spoofs(
        &self,
        snapshot: &ConfigSnapshot,
    ) -> Result<SyncReport, SyncError> {
        let plan = plan_permanent_rules(snapshot);
        self.commit(Namespace::Permanent, plan.rules, plan.skipped).await
    }

    async fn commit(
        &self,
        namespace: Namespace,
        rules: Vec<HeaderRule>,
        skipped: Vec<SkippedEntry>,
    ) -> Result<SyncReport, SyncError> {
        let remove_ids: Vec<i32> = self
            .engine
            .list_rule_ids()
            .await?
            .into_iter()
            .filter(|id| namespace.contains(*id))
            .collect();

        let mutation = RuleMutation::scoped(namespace, remove_ids, rules)?;
        let report = SyncReport {
            namespace,
            removed: mutation.remove_ids.clone(),
            added: mutation.add_rules.iter().map(|rule| rule.id).collect(),
            skipped,
        };

        if !mutation.is_empty() {
            self.engine.mutate_rules(mutation).await?;
        }

        log::debug!(
            "Synced {} rules: removed {:?}, added {:?}, skipped {}",
            namespace.as_str(),
            report.removed,
            report.added,
            report.skipped.len()
        );

        Ok(report)
    }
}
