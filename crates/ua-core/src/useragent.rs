//! Final user-agent resolution

use crate::types::{UaMode, UserAgentProfile};

/// Baseline desktop user-agent that `Append` profiles extend.
///
/// The background context cannot read the browser's real user-agent
/// reliably, so a fixed Chrome 120 on Windows string stands in for it.
pub const BASELINE_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Header value a profile should produce, or `None` when requests should
/// keep the browser's native user-agent.
pub fn resolve_final_user_agent(profile: Option<&UserAgentProfile>) -> Option<String> {
    let profile = profile?;
    if profile.is_default() || profile.user_agent.is_empty() {
        return None;
    }

    match profile.mode {
        UaMode::Replace => Some(profile.user_agent.clone()),
        UaMode::Append => Some(format!("{} {}", BASELINE_USER_AGENT, profile.user_agent)),
    }
}
