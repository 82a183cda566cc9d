//! Interface to the browser's declarative request-filtering engine

use async_trait::async_trait;
use ua_core::rule::{HeaderRule, Namespace};

/// Error reported by the engine for a rule table call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Rule id {0} is already installed")]
    IdConflict(i32),
    #[error("Invalid rule {id}: {reason}")]
    InvalidRule { id: i32, reason: String },
    #[error("Engine call failed: {0}")]
    Host(String),
}

/// A mutation touched an id outside the namespace it was built for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Rule id {id} does not belong to the {} namespace", .namespace.as_str())]
pub struct NamespaceViolation {
    pub namespace: Namespace,
    pub id: i32,
}

/// One add/remove batch. Removals apply before additions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleMutation {
    pub remove_ids: Vec<i32>,
    pub add_rules: Vec<HeaderRule>,
}

impl RuleMutation {
    /// Build a mutation that only touches ids owned by `namespace`.
    pub fn scoped(
        namespace: Namespace,
        remove_ids: Vec<i32>,
        add_rules: Vec<HeaderRule>,
    ) -> Result<Self, NamespaceViolation> {
        let foreign = remove_ids
            .iter()
            .copied()
            .chain(add_rules.iter().map(|rule| rule.id))
            .find(|id| !namespace.contains(*id));

        match foreign {
            Some(id) => Err(NamespaceViolation { namespace, id }),
            None => Ok(Self {
                remove_ids,
                add_rules,
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.remove_ids.is_empty() && self.add_rules.is_empty()
    }
}

/// The engine's dynamic rule table.
///
/// `mutate_rules` must apply a batch atomically, or at least apply its
/// removals before its additions so re-added ids never conflict.
#[async_trait(?Send)]
pub trait RuleEngine {
    /// Installed user-agent rules. Rules of other shapes may be left out.
    async fn list_rules(&self) -> Result<Vec<HeaderRule>, EngineError>;

    /// Ids of every installed rule, whatever its shape.
    async fn list_rule_ids(&self) -> Result<Vec<i32>, EngineError> {
        Ok(self.list_rules().await?.iter().map(|rule| rule.id).collect())
    }

    async fn mutate_rules(&self, mutation: RuleMutation) -> Result<(), EngineError>;
}
