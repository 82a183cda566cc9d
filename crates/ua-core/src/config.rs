//! Persisted configuration snapshot
//!
//! The browser store hands back loosely-typed JSON. Every key is parsed on
//! its own and every list element on its own, so a missing key or one bad
//! entry never prevents the rest of the configuration from being used.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::pattern::{DomainPattern, PatternError};
use crate::types::{PermanentSpoofEntry, Settings, UserAgentProfile, DEFAULT_PROFILE_ID};

// =============================================================================
// Storage keys
// =============================================================================

pub const USER_AGENTS_KEY: &str = "userAgents";
pub const ACTIVE_ID_KEY: &str = "activeId";
pub const PERMANENT_SPOOFS_KEY: &str = "permanentSpoofs";
pub const SETTINGS_KEY: &str = "settings";

/// Every key the rule engine reads.
pub const CONFIG_KEYS: [&str; 4] = [USER_AGENTS_KEY, ACTIVE_ID_KEY, PERMANENT_SPOOFS_KEY, SETTINGS_KEY];

/// Version written into export documents.
pub const EXPORT_VERSION: &str = "1.0";

// =============================================================================
// Snapshot
// =============================================================================

/// Everything rule computation needs, read at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSnapshot {
    pub profiles: Vec<UserAgentProfile>,
    pub active_id: String,
    pub spoofs: Vec<PermanentSpoofEntry>,
    pub settings: Settings,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            profiles: Vec::new(),
            active_id: DEFAULT_PROFILE_ID.to_string(),
            spoofs: Vec::new(),
            settings: Settings::default(),
        }
    }
}

impl ConfigSnapshot {
    /// Build a snapshot from raw store values.
    pub fn from_map(values: &Map<String, Value>) -> Self {
        let active_id = read_key::<String>(values, ACTIVE_ID_KEY)
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| DEFAULT_PROFILE_ID.to_string());

        Self {
            profiles: read_list(values, USER_AGENTS_KEY),
            active_id,
            spoofs: read_list(values, PERMANENT_SPOOFS_KEY),
            settings: read_key(values, SETTINGS_KEY).unwrap_or_default(),
        }
    }

    /// Build a snapshot from an imported document. The active profile is
    /// kept when it still exists and reset to the default otherwise.
    pub fn from_export(document: &ExportDocument, active_id: &str) -> Self {
        let mut snapshot = Self {
            profiles: document.user_agents.clone().unwrap_or_default(),
            active_id: active_id.to_string(),
            spoofs: document.permanent_spoofs.clone().unwrap_or_default(),
            settings: document.settings.clone().unwrap_or_default(),
        };
        if snapshot.profile(active_id).is_none() {
            snapshot.active_id = DEFAULT_PROFILE_ID.to_string();
        }
        snapshot
    }

    pub fn to_export(&self, export_date: &str) -> ExportDocument {
        ExportDocument {
            version: Some(EXPORT_VERSION.to_string()),
            export_date: Some(export_date.to_string()),
            user_agents: Some(self.profiles.clone()),
            permanent_spoofs: Some(self.spoofs.clone()),
            settings: Some(self.settings.clone()),
        }
    }

    pub fn profile(&self, id: &str) -> Option<&UserAgentProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn active_profile(&self) -> Option<&UserAgentProfile> {
        self.profile(&self.active_id)
    }

    /// Is a profile other than the browser default selected?
    pub fn has_manual_selection(&self) -> bool {
        self.active_id != DEFAULT_PROFILE_ID
    }

    pub fn override_priority(&self) -> bool {
        self.settings.permanent_override
    }

    /// Consistency problems a UI or import should surface.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        let defaults: Vec<&UserAgentProfile> = self.profiles.iter().filter(|p| p.is_default()).collect();
        match defaults.as_slice() {
            [] => issues.push(ConfigIssue::MissingDefaultProfile),
            [only] => {
                if !only.user_agent.is_empty() {
                    issues.push(ConfigIssue::DefaultProfileHasUserAgent);
                }
            }
            _ => issues.push(ConfigIssue::DuplicateProfileId(DEFAULT_PROFILE_ID.to_string())),
        }

        let mut seen_ids = HashSet::new();
        for profile in &self.profiles {
            if !profile.is_default() && !seen_ids.insert(profile.id.as_str()) {
                issues.push(ConfigIssue::DuplicateProfileId(profile.id.clone()));
            }
        }

        if self.has_manual_selection() && self.active_profile().is_none() {
            issues.push(ConfigIssue::DanglingActiveProfile(self.active_id.clone()));
        }

        let mut seen_domains = HashSet::new();
        for entry in &self.spoofs {
            let domain = entry.domain.trim().to_ascii_lowercase();
            if !seen_domains.insert(domain) {
                issues.push(ConfigIssue::DuplicateSpoofDomain(entry.domain.clone()));
            }
            if let Err(error) = DomainPattern::parse(&entry.domain) {
                issues.push(ConfigIssue::InvalidSpoofPattern {
                    domain: entry.domain.clone(),
                    error,
                });
            }
            if self.profile(&entry.user_agent_id).is_none() {
                issues.push(ConfigIssue::DanglingSpoofProfile {
                    domain: entry.domain.clone(),
                    user_agent_id: entry.user_agent_id.clone(),
                });
            }
        }

        issues
    }
}

/// A consistency problem found by [`ConfigSnapshot::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigIssue {
    #[error("No profile with the reserved id \"default\"")]
    MissingDefaultProfile,
    #[error("The default profile carries a user-agent string")]
    DefaultProfileHasUserAgent,
    #[error("Duplicate profile id: {0}")]
    DuplicateProfileId(String),
    #[error("Active profile {0} does not exist")]
    DanglingActiveProfile(String),
    #[error("Duplicate spoof domain: {0}")]
    DuplicateSpoofDomain(String),
    #[error("Invalid spoof pattern {domain}: {error}")]
    InvalidSpoofPattern { domain: String, error: PatternError },
    #[error("Spoof {domain} refers to missing profile {user_agent_id}")]
    DanglingSpoofProfile { domain: String, user_agent_id: String },
}

// =============================================================================
// Export document
// =============================================================================

/// Import/export file shape. Every section is optional on read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ExportDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub export_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub user_agents: Option<Vec<UserAgentProfile>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub permanent_spoofs: Option<Vec<PermanentSpoofEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub settings: Option<Settings>,
}

impl ExportDocument {
    /// Lenient read of a parsed document: bad sections and bad list entries
    /// are dropped with a warning instead of failing the whole import.
    pub fn from_map(values: &Map<String, Value>) -> Self {
        Self {
            version: read_key(values, "version"),
            export_date: read_key(values, "exportDate"),
            user_agents: values
                .contains_key(USER_AGENTS_KEY)
                .then(|| read_list(values, USER_AGENTS_KEY)),
            permanent_spoofs: values
                .contains_key(PERMANENT_SPOOFS_KEY)
                .then(|| read_list(values, PERMANENT_SPOOFS_KEY)),
            settings: read_key(values, SETTINGS_KEY),
        }
    }
}

// =============================================================================
// Lenient readers
// =============================================================================

fn read_key<T: DeserializeOwned>(values: &Map<String, Value>, key: &str) -> Option<T> {
    let value = values.get(key)?;
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            log::warn!("Ignoring malformed `{}` in configuration: {}", key, e);
            None
        }
    }
}

fn read_list<T: DeserializeOwned>(values: &Map<String, Value>, key: &str) -> Vec<T> {
    let Some(value) = values.get(key) else {
        return Vec::new();
    };
    let Some(items) = value.as_array() else {
        if !value.is_null() {
            log::warn!("Ignoring `{}` in configuration: expected a list", key);
        }
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| match serde_json::from_value(item.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                log::warn!("Skipping malformed `{}` entry {}: {}", key, idx, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::default_user_agents;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_empty_store_gives_defaults() {
        let snapshot = ConfigSnapshot::from_map(&Map::new());
        assert_eq!(snapshot, ConfigSnapshot::default());
        assert_eq!(snapshot.active_id, DEFAULT_PROFILE_ID);
        assert!(!snapshot.has_manual_selection());
        assert!(!snapshot.override_priority());
    }

    #[test]
    fn test_malformed_keys_are_defaulted() {
        let values = as_map(json!({
            "userAgents": [
                { "id": "default", "userAgent": "" },
                { "name": "missing id" },
                { "id": "x", "userAgent": "FooBot/1.0" }
            ],
            "activeId": 42,
            "permanentSpoofs": "not a list",
            "settings": { "permanentOverride": true }
        }));

        let snapshot = ConfigSnapshot::from_map(&values);
        assert_eq!(snapshot.profiles.len(), 2);
        assert_eq!(snapshot.active_id, DEFAULT_PROFILE_ID);
        assert!(snapshot.spoofs.is_empty());
        assert!(snapshot.override_priority());
        assert!(!snapshot.settings.per_tab_spoof);
    }

    #[test]
    fn test_spoof_without_id_still_loads() {
        let snapshot = ConfigSnapshot::from_map(&as_map(json!({
            "permanentSpoofs": [{ "domain": "test.com", "userAgentId": "x", "enabled": true }]
        })));
        assert_eq!(snapshot.spoofs.len(), 1);
        assert_eq!(snapshot.spoofs[0].domain, "test.com");
    }

    #[test]
    fn test_active_profile_lookup() {
        let values = as_map(json!({
            "userAgents": default_user_agents(),
            "activeId": "iphone"
        }));
        let snapshot = ConfigSnapshot::from_map(&values);
        assert!(snapshot.has_manual_selection());
        assert_eq!(snapshot.active_profile().map(|p| p.alias.as_str()), Some("iOS"));
    }

    #[test]
    fn test_validate_reports_issues() {
        let values = as_map(json!({
            "userAgents": [
                { "id": "default", "userAgent": "Oops/1.0" },
                { "id": "x", "userAgent": "FooBot/1.0" },
                { "id": "x", "userAgent": "BarBot/1.0" }
            ],
            "activeId": "gone",
            "permanentSpoofs": [
                { "id": "1", "domain": "test.com", "userAgentId": "x" },
                { "id": "2", "domain": "TEST.com", "userAgentId": "missing" },
                { "id": "3", "domain": "*", "userAgentId": "x" }
            ]
        }));

        let issues = ConfigSnapshot::from_map(&values).validate();
        assert!(issues.contains(&ConfigIssue::DefaultProfileHasUserAgent));
        assert!(issues.contains(&ConfigIssue::DuplicateProfileId("x".to_string())));
        assert!(issues.contains(&ConfigIssue::DanglingActiveProfile("gone".to_string())));
        assert!(issues.contains(&ConfigIssue::DuplicateSpoofDomain("TEST.com".to_string())));
        assert!(issues.contains(&ConfigIssue::DanglingSpoofProfile {
            domain: "TEST.com".to_string(),
            user_agent_id: "missing".to_string(),
        }));
        assert!(issues.contains(&ConfigIssue::InvalidSpoofPattern {
            domain: "*".to_string(),
            error: PatternError::BareWildcard,
        }));
    }

    #[test]
    fn test_validate_clean_defaults() {
        let snapshot = ConfigSnapshot {
            profiles: default_user_agents(),
            ..ConfigSnapshot::default()
        };
        assert!(snapshot.validate().is_empty());
        assert_eq!(
            ConfigSnapshot::default().validate(),
            vec![ConfigIssue::MissingDefaultProfile]
        );
    }

    #[test]
    fn test_export_document_partial_sections() {
        let values = as_map(json!({
            "version": "1.0",
            "permanentSpoofs": [
                { "id": "1", "domain": "test.com", "userAgentId": "x", "enabled": false },
                { "bogus": true }
            ]
        }));

        let document = ExportDocument::from_map(&values);
        assert_eq!(document.version.as_deref(), Some("1.0"));
        assert!(document.user_agents.is_none());
        assert!(document.settings.is_none());
        assert_eq!(document.permanent_spoofs.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_export_roundtrip_keeps_active_when_present() {
        let snapshot = ConfigSnapshot {
            profiles: default_user_agents(),
            active_id: "android".to_string(),
            ..ConfigSnapshot::default()
        };

        let document = snapshot.to_export("2024-01-01T00:00:00Z");
        assert_eq!(document.version.as_deref(), Some(EXPORT_VERSION));
        assert_eq!(ConfigSnapshot::from_export(&document, "android"), snapshot);

        let reset = ConfigSnapshot::from_export(&document, "deleted");
        assert_eq!(reset.active_id, DEFAULT_PROFILE_ID);
    }
}
