//! Engine-facing header rules and the two rule id namespaces.
//!
//! Rule ids in `[1, 999]` belong to the manual selection, ids from 1000 up
//! belong to permanent spoofs. Everything that touches the engine's rule
//! table goes through [`Namespace`] so neither side can enumerate, remove
//! or renumber rules owned by the other.

use serde::{Deserialize, Serialize};

use crate::types::ResourceTypes;

/// Raw id of the single manual-selection rule.
pub const MANUAL_RULE_ID: i32 = 1;
/// Last raw id reserved for the manual namespace.
pub const MANUAL_RANGE_END: i32 = 999;
/// First raw id of the permanent-spoof namespace.
pub const PERMANENT_RULE_BASE: i32 = 1000;

/// Header every rule rewrites.
pub const USER_AGENT_HEADER: &str = "user-agent";

// =============================================================================
// Namespaces and typed ids
// =============================================================================

/// Owner of a range of engine rule ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// The single rule derived from the popup's active profile
    Manual,
    /// Rules derived from the permanent spoof list
    Permanent,
}

impl Namespace {
    /// Classify a raw engine id. Ids below 1 belong to nobody.
    pub fn of(raw: i32) -> Option<Self> {
        match raw {
            1..=MANUAL_RANGE_END => Some(Self::Manual),
            PERMANENT_RULE_BASE..=i32::MAX => Some(Self::Permanent),
            _ => None,
        }
    }

    pub fn contains(self, raw: i32) -> bool {
        Self::of(raw) == Some(self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Permanent => "permanent",
        }
    }
}

/// Typed rule identifier; the only way rules are numbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleId {
    Manual,
    /// Sequence number within the permanent namespace, starting at 0
    Permanent(u16),
}

impl RuleId {
    pub fn raw(self) -> i32 {
        match self {
            Self::Manual => MANUAL_RULE_ID,
            Self::Permanent(seq) => PERMANENT_RULE_BASE + i32::from(seq),
        }
    }

    pub fn namespace(self) -> Namespace {
        match self {
            Self::Manual => Namespace::Manual,
            Self::Permanent(_) => Namespace::Permanent,
        }
    }
}

// =============================================================================
// Precedence
// =============================================================================

/// Priority levels encoding which source wins on overlapping requests.
///
/// The manual level sits between the two permanent levels, so flipping the
/// override flag only has to move the permanent rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrecedenceTable {
    pub manual: u32,
    pub permanent_when_override: u32,
    pub permanent_when_not_override: u32,
}

pub const PRECEDENCE: PrecedenceTable = PrecedenceTable {
    manual: 2,
    permanent_when_override: 3,
    permanent_when_not_override: 1,
};

impl PrecedenceTable {
    /// Priority of the manual rule. Independent of the override flag.
    pub const fn manual(&self) -> u32 {
        self.manual
    }

    /// Priority of every permanent rule for the given override flag.
    pub const fn permanent(&self, override_priority: bool) -> u32 {
        if override_priority {
            self.permanent_when_override
        } else {
            self.permanent_when_not_override
        }
    }

    /// Namespace whose rule applies when both match a request.
    pub fn winner(&self, override_priority: bool) -> Namespace {
        if self.permanent(override_priority) > self.manual() {
            Namespace::Permanent
        } else {
            Namespace::Manual
        }
    }
}

// =============================================================================
// Header rules
// =============================================================================

/// A rule that sets the `User-Agent` request header on matching requests.
///
/// Serializes to the engine's rule object shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "RuleObject", try_from = "RuleObject")]
pub struct HeaderRule {
    /// Raw engine id; see [`Namespace::of`]
    pub id: i32,
    pub priority: u32,
    /// Engine URL filter (`*` for every URL)
    pub url_filter: String,
    pub resource_types: ResourceTypes,
    /// Value the header is overwritten with
    pub user_agent: String,
}

impl HeaderRule {
    pub fn namespace(&self) -> Option<Namespace> {
        Namespace::of(self.id)
    }
}

/// Error converting an engine rule object that is not a user-agent rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleShapeError {
    #[error("Unsupported action type: {0}")]
    UnsupportedAction(String),
    #[error("Rule {0} does not set the user-agent header")]
    NoUserAgentOperation(i32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RuleObject {
    id: i32,
    #[serde(default = "default_priority")]
    priority: u32,
    action: ActionObject,
    condition: ConditionObject,
}

fn default_priority() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionObject {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    request_headers: Vec<HeaderOperation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HeaderOperation {
    header: String,
    operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConditionObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url_filter: Option<String>,
    #[serde(default)]
    resource_types: ResourceTypes,
}

impl From<HeaderRule> for RuleObject {
    fn from(rule: HeaderRule) -> Self {
        Self {
            id: rule.id,
            priority: rule.priority,
            action: ActionObject {
                kind: "modifyHeaders".to_string(),
                request_headers: vec![HeaderOperation {
                    header: USER_AGENT_HEADER.to_string(),
                    operation: "set".to_string(),
                    value: Some(rule.user_agent),
                }],
            },
            condition: ConditionObject {
                url_filter: Some(rule.url_filter),
                resource_types: rule.resource_types,
            },
        }
    }
}

impl TryFrom<RuleObject> for HeaderRule {
    type Error = RuleShapeError;

    fn try_from(object: RuleObject) -> Result<Self, Self::Error> {
        if object.action.kind != "modifyHeaders" {
            return Err(RuleShapeError::UnsupportedAction(object.action.kind));
        }

        let user_agent = object
            .action
            .request_headers
            .into_iter()
            .find(|op| op.header.eq_ignore_ascii_case(USER_AGENT_HEADER) && op.operation == "set")
            .and_then(|op| op.value)
            .ok_or(RuleShapeError::NoUserAgentOperation(object.id))?;

        Ok(Self {
            id: object.id,
            priority: object.priority,
            url_filter: object.condition.url_filter.unwrap_or_else(|| "*".to_string()),
            resource_types: object.condition.resource_types,
            user_agent,
        })
    }
}
