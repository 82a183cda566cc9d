//! Core type definitions for the User-Agent switcher
//!
//! These types mirror the persisted configuration shape (camelCase keys)
//! and the resource categories understood by the browser's request
//! filtering engine.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ts_rs::TS;

/// Identifier of the reserved profile meaning "use the browser's native user-agent".
pub const DEFAULT_PROFILE_ID: &str = "default";

/// Badge colours used when a profile does not carry its own.
pub const DEFAULT_BADGE_TEXT_COLOR: &str = "#ffffff";
pub const DEFAULT_BADGE_BG_COLOR: &str = "#1a73e8";

// =============================================================================
// Profiles
// =============================================================================

/// How a profile's string is combined with the baseline user-agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum UaMode {
    /// Append the profile's string to the baseline user-agent
    Append,
    /// Send the profile's string verbatim. Unknown modes read as this.
    #[default]
    #[serde(other)]
    Replace,
}

/// A named user-agent override selectable from the popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserAgentProfile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Short label shown on the toolbar badge
    #[serde(default)]
    pub alias: String,
    /// Empty for the reserved default profile
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub mode: UaMode,
    #[serde(default = "default_badge_text_color")]
    pub badge_text_color: String,
    #[serde(default = "default_badge_bg_color")]
    pub badge_bg_color: String,
}

fn default_badge_text_color() -> String {
    DEFAULT_BADGE_TEXT_COLOR.to_string()
}

fn default_badge_bg_color() -> String {
    DEFAULT_BADGE_BG_COLOR.to_string()
}

impl UserAgentProfile {
    /// Is this the reserved "browser default" profile?
    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_PROFILE_ID
    }
}

/// Profiles seeded on first run.
pub fn default_user_agents() -> Vec<UserAgentProfile> {
    vec![
        UserAgentProfile {
            id: DEFAULT_PROFILE_ID.to_string(),
            name: "Default (Chrome)".to_string(),
            alias: "DEF".to_string(),
            user_agent: String::new(),
            mode: UaMode::Replace,
            badge_text_color: "#ffffff".to_string(),
            badge_bg_color: "#666666".to_string(),
        },
        UserAgentProfile {
            id: "iphone".to_string(),
            name: "iPhone 14".to_string(),
            alias: "iOS".to_string(),
            user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1".to_string(),
            mode: UaMode::Replace,
            badge_text_color: "#ffffff".to_string(),
            badge_bg_color: "#1a73e8".to_string(),
        },
        UserAgentProfile {
            id: "android".to_string(),
            name: "Android".to_string(),
            alias: "AND".to_string(),
            user_agent: "Mozilla/5.0 (Linux; Android 13) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/112.0.0.0 Mobile Safari/537.36".to_string(),
            mode: UaMode::Replace,
            badge_text_color: "#ffffff".to_string(),
            badge_bg_color: "#34a853".to_string(),
        },
    ]
}

// =============================================================================
// Permanent spoofs
// =============================================================================

/// A standing domain-scoped override, applied independently of the manual selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PermanentSpoofEntry {
    /// UI handle only; rule building never reads it
    #[serde(default)]
    pub id: String,
    /// Domain pattern as typed by the user
    pub domain: String,
    /// Weak reference into the profile list, resolved at rule-build time
    pub user_agent_id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

// =============================================================================
// Settings
// =============================================================================

/// Persisted settings record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Settings {
    /// When set, permanent spoofs win over the manual selection
    #[serde(default)]
    pub permanent_override: bool,
    /// Persisted for the UI only; rule computation does not read it
    #[serde(default)]
    pub per_tab_spoof: bool,
    /// Last options page section the user had open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub active_section: Option<String>,
}

// =============================================================================
// Resource Types (bit mask for rule conditions)
// =============================================================================

bitflags::bitflags! {
    /// Resource categories a header rule applies to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceTypes: u16 {
        const MAIN_FRAME = 1 << 0;
        const SUB_FRAME = 1 << 1;
        const STYLESHEET = 1 << 2;
        const SCRIPT = 1 << 3;
        const IMAGE = 1 << 4;
        const FONT = 1 << 5;
        const OBJECT = 1 << 6;
        const XMLHTTPREQUEST = 1 << 7;
        const PING = 1 << 8;
        const CSP_REPORT = 1 << 9;
        const MEDIA = 1 << 10;
        const WEBSOCKET = 1 << 11;
        const WEBTRANSPORT = 1 << 12;
        const WEBBUNDLE = 1 << 13;
        const OTHER = 1 << 14;

        /// Every category the engine supports
        const ALL = 0x7FFF;
    }
}

/// Engine names, in the order the engine documents them.
const RESOURCE_TYPE_NAMES: [(ResourceTypes, &str); 15] = [
    (ResourceTypes::MAIN_FRAME, "main_frame"),
    (ResourceTypes::SUB_FRAME, "sub_frame"),
    (ResourceTypes::STYLESHEET, "stylesheet"),
    (ResourceTypes::SCRIPT, "script"),
    (ResourceTypes::IMAGE, "image"),
    (ResourceTypes::FONT, "font"),
    (ResourceTypes::OBJECT, "object"),
    (ResourceTypes::XMLHTTPREQUEST, "xmlhttprequest"),
    (ResourceTypes::PING, "ping"),
    (ResourceTypes::CSP_REPORT, "csp_report"),
    (ResourceTypes::MEDIA, "media"),
    (ResourceTypes::WEBSOCKET, "websocket"),
    (ResourceTypes::WEBTRANSPORT, "webtransport"),
    (ResourceTypes::WEBBUNDLE, "webbundle"),
    (ResourceTypes::OTHER, "other"),
];

impl ResourceTypes {
    /// Parse a single engine resource type name.
    pub fn from_engine_name(name: &str) -> Option<Self> {
        RESOURCE_TYPE_NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(flag, _)| *flag)
    }

    /// Engine names of every set category.
    pub fn names(self) -> Vec<&'static str> {
        RESOURCE_TYPE_NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl Serialize for ResourceTypes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.names())
    }
}

impl<'de> Deserialize<'de> for ResourceTypes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        Ok(names
            .iter()
            .filter_map(|name| Self::from_engine_name(name))
            .fold(Self::empty(), |acc, flag| acc | flag))
    }
}
