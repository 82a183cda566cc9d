use ua_core::rule::{HeaderRule, RuleId};
use ua_core::types::ResourceTypes;

/// URL filter matching every request.
pub const MATCH_ALL: &str = "*";

/// Build a rule that overwrites the `User-Agent` header with `final_user_agent`
/// on requests matching `url_filter`.
pub fn build_rule(
    id: RuleId,
    priority: u32,
    resource_types: ResourceTypes,
    url_filter: &str,
    final_user_agent: &str,
) -> HeaderRule {
    HeaderRule {
        id: id.raw(),
        priority,
        url_filter: url_filter.to_string(),
        resource_types,
        user_agent: final_user_agent.to_string(),
    }
}
