//! User-Agent Switcher Rule Compiler
//!
//! This crate turns a configuration snapshot into the header rules each
//! namespace should hold in the engine's dynamic rule table.

pub mod builder;
pub mod planner;

pub use builder::{build_rule, MATCH_ALL};
pub use planner::{plan_manual_rule, plan_permanent_rules, PermanentPlan, SkipReason, SkippedEntry};
