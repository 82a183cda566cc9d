//! Desired rule sets for the two namespaces
//!
//! Planning is pure: it reads a configuration snapshot and returns the
//! complete rule set a namespace should hold. The synchronizer diffs that
//! against the engine.

use ua_core::config::ConfigSnapshot;
use ua_core::pattern::{DomainPattern, PatternError};
use ua_core::rule::{HeaderRule, RuleId, PRECEDENCE};
use ua_core::types::{ResourceTypes, UserAgentProfile};
use ua_core::useragent::resolve_final_user_agent;

use crate::builder::{build_rule, MATCH_ALL};

/// Number of ids available to the permanent namespace.
const PERMANENT_ID_CAPACITY: usize = u16::MAX as usize + 1;

/// The manual-selection rule for `profile`, or `None` when requests should
/// keep the native user-agent.
pub fn plan_manual_rule(profile: Option<&UserAgentProfile>) -> Option<HeaderRule> {
    let final_user_agent = resolve_final_user_agent(profile)?;
    Some(build_rule(
        RuleId::Manual,
        PRECEDENCE.manual(),
        ResourceTypes::ALL,
        MATCH_ALL,
        &final_user_agent,
    ))
}

/// Why a spoof entry produced no rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    /// The referenced profile no longer exists
    MissingProfile(String),
    /// The referenced profile resolves to the native user-agent
    NoUserAgent(String),
    InvalidPattern(PatternError),
    IdSpaceExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub entry_id: String,
    pub domain: String,
    pub reason: SkipReason,
}

/// Desired contents of the permanent namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermanentPlan {
    pub rules: Vec<HeaderRule>,
    pub skipped: Vec<SkippedEntry>,
}

/// Rules for every enabled, resolvable spoof entry, in list order.
///
/// Ids are handed out sequentially from the start of the namespace, one per
/// URL filter, so a plain domain consumes two consecutive ids. Every rule
/// shares the priority the override flag selects.
pub fn plan_permanent_rules(snapshot: &ConfigSnapshot) -> PermanentPlan {
    let priority = PRECEDENCE.permanent(snapshot.override_priority());
    let mut plan = PermanentPlan::default();

    for entry in &snapshot.spoofs {
        let skip = |reason: SkipReason| SkippedEntry {
            entry_id: entry.id.clone(),
            domain: entry.domain.clone(),
            reason,
        };

        if !entry.enabled {
            log::debug!("Spoof {} is disabled", entry.domain);
            plan.skipped.push(skip(SkipReason::Disabled));
            continue;
        }

        let Some(profile) = snapshot.profile(&entry.user_agent_id) else {
            log::warn!(
                "Spoof {} refers to missing profile {}, skipping",
                entry.domain,
                entry.user_agent_id
            );
            plan.skipped.push(skip(SkipReason::MissingProfile(entry.user_agent_id.clone())));
            continue;
        };

        let Some(final_user_agent) = resolve_final_user_agent(Some(profile)) else {
            log::warn!(
                "Spoof {} uses profile {} without a user-agent, skipping",
                entry.domain,
                profile.id
            );
            plan.skipped.push(skip(SkipReason::NoUserAgent(profile.id.clone())));
            continue;
        };

        let pattern = match DomainPattern::parse(&entry.domain) {
            Ok(pattern) => pattern,
            Err(e) => {
                log::warn!("Spoof {:?} has an invalid pattern: {}", entry.domain, e);
                plan.skipped.push(skip(SkipReason::InvalidPattern(e)));
                continue;
            }
        };

        let filters = pattern.url_filters();
        if plan.rules.len() + filters.len() > PERMANENT_ID_CAPACITY {
            log::warn!("No rule ids left for spoof {}", entry.domain);
            plan.skipped.push(skip(SkipReason::IdSpaceExhausted));
            continue;
        }

        for filter in &filters {
            // Bounded by the capacity check above
            let seq = plan.rules.len() as u16;
            plan.rules.push(build_rule(
                RuleId::Permanent(seq),
                priority,
                ResourceTypes::ALL,
                filter,
                &final_user_agent,
            ));
        }
    }

    plan
}
