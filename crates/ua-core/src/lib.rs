//! User-Agent Switcher Core Library
//!
//! This crate holds the data model and the pure building blocks of the
//! header-rewrite rule engine: the persisted configuration shape, the typed
//! rule id namespaces, domain pattern compilation and final user-agent
//! resolution.
//!
//! # Modules
//!
//! - `types`: profiles, spoof entries, settings and resource type flags
//! - `rule`: engine-facing header rules, rule id namespaces and precedence
//! - `pattern`: domain entry validation and URL filter compilation
//! - `useragent`: final user-agent resolution for a profile
//! - `config`: lenient configuration snapshot and export document
//! - `badge`: toolbar badge state for the active profile

pub mod badge;
pub mod config;
pub mod pattern;
pub mod rule;
pub mod types;
pub mod useragent;

// Re-export commonly used types
pub use badge::BadgeState;
pub use config::{ConfigIssue, ConfigSnapshot, ExportDocument};
pub use pattern::{compile_domain_pattern, DomainPattern, PatternError};
pub use rule::{HeaderRule, Namespace, PrecedenceTable, RuleId, PRECEDENCE};
pub use types::{
    PermanentSpoofEntry, ResourceTypes, Settings, UaMode, UserAgentProfile, DEFAULT_PROFILE_ID,
};
pub use useragent::{resolve_final_user_agent, BASELINE_USER_AGENT};
